use gridsim_fsm::DEFAULT_TRANSITION_LIMIT;
use gridsim_nav::{Adjacency, Heuristic, PlannerSettings};

/// Tunables of a [`crate::World`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct WorldConfig {
    pub adjacency: Adjacency,
    pub heuristic: Heuristic,
    /// Weight of the heuristic relative to accumulated cost.
    pub cost_multiplier: f64,
    /// Hide undiscovered cells from path search.
    pub fog: bool,
    /// Square radius uncovered by [`crate::World::reveal`].
    pub reveal_radius: u32,
    /// Background search threads. Zero runs searches inline.
    pub path_workers: usize,
    pub seed: u64,
    /// Simulated time at which the clock starts, in hours.
    pub start_time: f64,
    pub hours_per_day: f64,
    /// Allow diagonal steps past a blocked orthogonal neighbour.
    pub corner_cutting: bool,
    /// Maximum chained transitions applied per state callback.
    pub transition_limit: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            adjacency: Adjacency::Eight,
            heuristic: Heuristic::Diagonal,
            cost_multiplier: 1.0,
            fog: false,
            reveal_radius: 1,
            path_workers: 1,
            seed: 0,
            start_time: 0.0,
            hours_per_day: 24.0,
            corner_cutting: false,
            transition_limit: DEFAULT_TRANSITION_LIMIT,
        }
    }
}

impl WorldConfig {
    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            adjacency: self.adjacency,
            heuristic: self.heuristic,
            cost_multiplier: self.cost_multiplier,
        }
    }
}
