use core::cmp::Ordering;
use core::fmt;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use gridsim_fsm::{
    derive_seed, SplitMix64, State, StateContext, StateKind, StateMachine, Transition, WorldMut,
    WorldView,
};
use gridsim_nav::{Cell, Grid, GridError, PathWorker, RequestId, Terrain, TileChange};
use tracing::{debug, trace};

use crate::paths::PendingPath;
use crate::{Agent, Recipients, Spawn, Telegram, WorldConfig, WorldError};

pub type BoxedState<D> = Box<dyn State<World<D>>>;
pub type Context<'a, D> = StateContext<'a, World<D>>;

const RNG_STREAM: u64 = 0x5EED;

/// Work addressed to an agent while its machine was on the call stack.
enum Deferred<D: 'static> {
    Message(Telegram),
    Transition(Transition<World<D>>),
}

struct Slot<D: 'static> {
    agent: Agent<D>,
    /// `None` while one of this agent's callbacks is running.
    machine: Option<StateMachine<World<D>>>,
    deferred: VecDeque<Deferred<D>>,
}

struct Scheduled {
    time: f64,
    seq: u64,
    telegram: Telegram,
}

impl Scheduled {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest first; same-time messages in enqueue order.
        other.key_cmp(self)
    }
}

/// Agent registry, message bus, simulated clock and owner of the grid.
///
/// Everything here runs on the simulation thread. The only work handed elsewhere is path
/// search, whose results come back through [`World::tick`].
pub struct World<D: 'static> {
    config: WorldConfig,
    grid: Arc<Grid>,
    agents: BTreeMap<u64, Slot<D>>,
    next_id: u64,
    time: f64,
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    places: BTreeMap<String, Cell>,
    rng: SplitMix64,
    pub(crate) planner: PathWorker,
    pub(crate) pending: HashMap<RequestId, PendingPath<D>>,
    pub(crate) generations: HashMap<u64, u64>,
}

impl<D: 'static> WorldView for World<D> {
    type Agent = u64;
    type Message = Telegram;
}

impl<D: 'static> WorldMut for World<D> {}

impl<D: 'static> World<D> {
    pub fn new(mut grid: Grid, config: WorldConfig) -> Result<Self, WorldError> {
        let planner = PathWorker::new(config.path_workers, config.planner_settings())?;
        if config.fog && !grid.fog_enabled() {
            grid.set_fog_enabled(true);
        }
        let grid = grid.with_corner_cutting(config.corner_cutting);
        debug!(
            width = grid.width(),
            height = grid.height(),
            workers = config.path_workers,
            "world created"
        );

        Ok(Self {
            rng: SplitMix64::new(derive_seed(config.seed, 0, RNG_STREAM)),
            time: config.start_time,
            config,
            grid: Arc::new(grid),
            agents: BTreeMap::new(),
            next_id: 0,
            queue: BinaryHeap::new(),
            next_seq: 0,
            places: BTreeMap::new(),
            planner,
            pending: HashMap::new(),
            generations: HashMap::new(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Add an agent and enter its initial state. Ids increase strictly, so id order is
    /// registration order.
    pub fn register(&mut self, spawn: Spawn<D>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let location = match spawn.location {
            Some(cell) => cell,
            None => self.random_free_cell(None, None).unwrap_or_default(),
        };
        let mut machine = StateMachine::new(spawn.initial)
            .with_transition_limit(self.config.transition_limit);
        machine.set_global(spawn.global);

        self.agents.insert(
            id,
            Slot {
                agent: Agent {
                    id,
                    location,
                    speed: spawn.speed,
                    data: spawn.data,
                },
                machine: None,
                deferred: VecDeque::new(),
            },
        );
        debug!(agent = id, %location, "agent registered");

        machine.start(id, self);
        self.restore(id, machine);
        id
    }

    /// Remove an agent. Its queued work and outstanding path requests are dropped.
    pub fn remove_agent(&mut self, id: u64) -> Option<Agent<D>> {
        let slot = self.agents.remove(&id)?;
        self.cancel_paths(id);
        self.generations.remove(&id);
        debug!(agent = id, "agent removed");
        Some(slot.agent)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.agents.contains_key(&id)
    }

    /// Registered ids in registration order.
    pub fn agent_ids(&self) -> Vec<u64> {
        self.agents.keys().copied().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent<D>> + '_ {
        self.agents.values().map(|slot| &slot.agent)
    }

    pub fn agent(&self, id: u64) -> Option<&Agent<D>> {
        self.agents.get(&id).map(|slot| &slot.agent)
    }

    pub fn agent_mut(&mut self, id: u64) -> Option<&mut Agent<D>> {
        self.agents.get_mut(&id).map(|slot| &mut slot.agent)
    }

    pub fn location(&self, id: u64) -> Option<Cell> {
        self.agent(id).map(|agent| agent.location)
    }

    /// Current state of `id`. `None` for unknown agents and for an agent whose own callback
    /// is running.
    pub fn state_of(&self, id: u64) -> Option<StateKind> {
        self.agents.get(&id)?.machine.as_ref()?.current_kind()
    }

    pub fn is_in_state(&self, id: u64, kind: StateKind) -> bool {
        self.agents
            .get(&id)
            .and_then(|slot| slot.machine.as_ref())
            .is_some_and(|machine| machine.is_in_state(kind))
    }

    /// Agents whose current state is (or specialises) `kind`, in registration order. An agent
    /// whose own callback is running is never included.
    pub fn agents_in_state(&self, kind: StateKind, limit: Option<usize>) -> Vec<u64> {
        self.agents
            .iter()
            .filter(|(_, slot)| {
                slot.machine
                    .as_ref()
                    .is_some_and(|machine| machine.is_in_state(kind))
            })
            .map(|(&id, _)| id)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Transition another agent. Returns `false` for unknown ids.
    pub fn change_state(
        &mut self,
        id: u64,
        state: BoxedState<D>,
        exit_current: bool,
        revertable: bool,
    ) -> bool {
        self.transition(
            id,
            Transition::Change {
                state,
                exit_current,
                revertable,
            },
        )
    }

    pub fn revert_state(&mut self, id: u64) -> bool {
        self.transition(id, Transition::Revert)
    }

    fn transition(&mut self, id: u64, transition: Transition<World<D>>) -> bool {
        let Some(slot) = self.agents.get_mut(&id) else {
            return false;
        };
        let Some(mut machine) = slot.machine.take() else {
            slot.deferred.push_back(Deferred::Transition(transition));
            return true;
        };
        machine.apply(id, self, transition);
        self.restore(id, machine);
        true
    }

    /// Put a checked-out machine back and run whatever was addressed to it meanwhile.
    fn restore(&mut self, id: u64, machine: StateMachine<World<D>>) {
        let Some(slot) = self.agents.get_mut(&id) else {
            // Removed from inside its own callback.
            return;
        };
        slot.machine = Some(machine);

        loop {
            let Some(slot) = self.agents.get_mut(&id) else {
                return;
            };
            let Some(work) = slot.deferred.pop_front() else {
                return;
            };
            let Some(mut machine) = slot.machine.take() else {
                slot.deferred.push_front(work);
                return;
            };
            match work {
                Deferred::Message(telegram) => {
                    machine.handle_message(id, self, &telegram);
                }
                Deferred::Transition(transition) => machine.apply(id, self, transition),
            }
            match self.agents.get_mut(&id) {
                Some(slot) => slot.machine = Some(machine),
                None => return,
            }
        }
    }

    /// Send `telegram` now (`delay <= 0`) or schedule it `delay` hours ahead.
    ///
    /// Immediate dispatch returns the number of recipients; scheduled dispatch returns 0.
    /// Recipients of scheduled telegrams are resolved at delivery time.
    pub fn dispatch(&mut self, mut telegram: Telegram, delay: f64) -> usize {
        if delay > 0.0 {
            telegram.dispatch_time = self.time + delay;
            trace!(
                sender = telegram.sender,
                kind = %telegram.kind,
                at = telegram.dispatch_time,
                "telegram scheduled"
            );
            let seq = self.next_seq;
            self.next_seq += 1;
            self.queue.push(Scheduled {
                time: telegram.dispatch_time,
                seq,
                telegram,
            });
            return 0;
        }
        self.deliver(&telegram)
    }

    /// Schedule `telegram` for the next time the clock reads `time_of_day` (hours), which is
    /// now if it reads exactly that.
    pub fn dispatch_scheduled(&mut self, time_of_day: f64, telegram: Telegram) -> usize {
        let hours = self.config.hours_per_day;
        let target = time_of_day.rem_euclid(hours);
        let now = self.clock();
        let delay = if target < now {
            hours - now + target
        } else {
            target - now
        };
        self.dispatch(telegram, delay)
    }

    /// Telegrams waiting for their delivery time.
    pub fn scheduled_len(&self) -> usize {
        self.queue.len()
    }

    fn deliver(&mut self, telegram: &Telegram) -> usize {
        let receivers: Vec<u64> = match &telegram.recipients {
            Recipients::Broadcast => self
                .agents
                .keys()
                .copied()
                .filter(|&id| id != telegram.sender)
                .collect(),
            Recipients::One(id) => vec![*id],
            Recipients::Many(ids) => {
                let mut unique = Vec::with_capacity(ids.len());
                for &id in ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                unique
            }
        };

        let delivered = receivers
            .into_iter()
            .filter(|&id| self.deliver_to(id, telegram))
            .count();
        trace!(
            sender = telegram.sender,
            kind = %telegram.kind,
            delivered,
            "telegram delivered"
        );
        delivered
    }

    pub(crate) fn deliver_to(&mut self, id: u64, telegram: &Telegram) -> bool {
        let Some(slot) = self.agents.get_mut(&id) else {
            return false;
        };
        let Some(mut machine) = slot.machine.take() else {
            slot.deferred.push_back(Deferred::Message(telegram.clone()));
            return true;
        };
        machine.handle_message(id, self, telegram);
        self.restore(id, machine);
        true
    }

    fn deliver_due(&mut self) {
        while self
            .queue
            .peek()
            .is_some_and(|scheduled| scheduled.time <= self.time)
        {
            let Some(scheduled) = self.queue.pop() else {
                break;
            };
            self.deliver(&scheduled.telegram);
        }
    }

    /// Advance the clock by `step` hours: deliver due telegrams, apply finished path searches,
    /// then update every agent in registration order.
    pub fn tick(&mut self, step: f32) {
        self.time += f64::from(step);
        self.deliver_due();
        self.apply_path_results();

        for id in self.agent_ids() {
            let Some(slot) = self.agents.get_mut(&id) else {
                continue;
            };
            let Some(mut machine) = slot.machine.take() else {
                continue;
            };
            machine.update(id, self, step);
            self.restore(id, machine);
        }
    }

    /// Total simulated hours.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time of day in hours, in `[0, hours_per_day)`.
    pub fn clock(&self) -> f64 {
        self.time.rem_euclid(self.config.hours_per_day)
    }

    pub fn day(&self) -> u64 {
        (self.time / self.config.hours_per_day).floor().max(0.0) as u64
    }

    /// Time of day as `HH:MM`.
    pub fn format_clock(&self) -> String {
        let minutes = (self.clock() * 60.0).round() as u64;
        let hours = (minutes / 60) % (self.config.hours_per_day.max(1.0) as u64);
        format!("{:02}:{:02}", hours, minutes % 60)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable grid access. Copies the grid first if a path search still holds a snapshot.
    pub fn grid_mut(&mut self) -> &mut Grid {
        Arc::make_mut(&mut self.grid)
    }

    pub(crate) fn grid_snapshot(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    pub fn set_tile(
        &mut self,
        cell: Cell,
        terrain: Terrain,
        weight: Option<u32>,
    ) -> Result<TileChange, GridError> {
        self.grid_mut().set_tile(cell, terrain, weight)
    }

    pub fn set_fog(&mut self, cell: Cell, fogged: bool) -> Result<(), GridError> {
        self.grid_mut().set_fog(cell, fogged)
    }

    pub fn is_fogged(&self, cell: Cell) -> bool {
        self.grid.is_fogged(cell)
    }

    /// Discover the cells within the configured radius of `cell`, returning those that were
    /// hidden before.
    pub fn reveal(&mut self, cell: Cell) -> Vec<Cell> {
        if !self.grid.fog_enabled() {
            return Vec::new();
        }
        let radius = self.config.reveal_radius;
        self.grid_mut().reveal(cell, radius)
    }

    /// Random free cell that is not a named place, optionally within `radius` of `origin`.
    pub fn random_free_cell(&mut self, origin: Option<Cell>, radius: Option<u32>) -> Option<Cell> {
        let places = &self.places;
        self.grid.random_free_cell(&mut self.rng, origin, radius, |cell| {
            places.values().any(|&place| place == cell)
        })
    }

    /// The world's seeded random stream, for behaviour code.
    pub fn rng(&mut self) -> &mut SplitMix64 {
        &mut self.rng
    }

    pub fn add_place(&mut self, name: impl Into<String>, cell: Cell) {
        self.places.insert(name.into(), cell);
    }

    pub fn place(&self, name: &str) -> Option<Cell> {
        self.places.get(name).copied()
    }

    pub fn places(&self) -> impl Iterator<Item = (&str, Cell)> + '_ {
        self.places.iter().map(|(name, &cell)| (name.as_str(), cell))
    }

    /// Put the named place on a random free cell not used by another place.
    pub fn place_random(&mut self, name: impl Into<String>) -> Option<Cell> {
        let cell = self.random_free_cell(None, None)?;
        self.places.insert(name.into(), cell);
        Some(cell)
    }

    pub fn is_at(&self, id: u64, place: &str) -> bool {
        match (self.location(id), self.place(place)) {
            (Some(location), Some(place)) => location == place,
            _ => false,
        }
    }
}

impl<D: 'static> fmt::Debug for World<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("time", &self.time)
            .field("agents", &self.agents.len())
            .field("scheduled", &self.queue.len())
            .field("pending_paths", &self.pending.len())
            .field("grid", &self.grid)
            .finish()
    }
}
