use gridsim_nav::Cell;

use crate::BoxedState;

/// Per-agent record owned by the world. `data` carries behaviour-specific fields.
#[derive(Debug, Clone)]
pub struct Agent<D> {
    pub id: u64,
    pub location: Cell,
    /// Cells advanced per unit of step on terrain of weight 1.
    pub speed: f32,
    pub data: D,
}

/// Everything needed to register an agent.
pub struct Spawn<D: 'static> {
    pub(crate) data: D,
    pub(crate) location: Option<Cell>,
    pub(crate) speed: f32,
    pub(crate) initial: BoxedState<D>,
    pub(crate) global: Option<BoxedState<D>>,
}

impl<D: 'static> Spawn<D> {
    pub fn new(data: D, initial: BoxedState<D>) -> Self {
        Self {
            data,
            location: None,
            speed: 1.0,
            initial,
            global: None,
        }
    }

    /// Starting cell. Without one the agent is placed on a random free cell at registration.
    pub fn at(mut self, location: Cell) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_global(mut self, global: BoxedState<D>) -> Self {
        self.global = Some(global);
        self
    }
}
