use std::time::Duration;

use gridsim_nav::{Cell, Completed, GoalPredicate, PathGoal, PathOutcome, RequestId};
use tracing::trace;

use crate::{PathReply, Telegram, World, PATH_READY};

/// Identifies one path request; carried back in [`PathReply`].
pub type PathTicket = RequestId;

type OnFinish<D> = Box<dyn FnOnce(&mut World<D>, PathOutcome)>;

pub(crate) enum Requester<D: 'static> {
    Agent(u64),
    Callback(OnFinish<D>),
}

pub(crate) struct PendingPath<D: 'static> {
    requester: Requester<D>,
    /// Requester's generation at submit time; a later [`World::cancel_paths`] invalidates it.
    generation: u64,
    cancelled: bool,
}

impl<D: 'static> World<D> {
    /// Plan from `agent`'s current cell to `goal`. The result reaches the agent as a
    /// [`PATH_READY`] telegram during a later tick. `None` if the agent is unknown.
    pub fn request_path(&mut self, agent: u64, goal: Cell, through_fog: bool) -> Option<PathTicket> {
        let origin = self.location(agent)?;
        Some(self.submit(
            origin,
            PathGoal::Cell(goal),
            through_fog,
            Requester::Agent(agent),
        ))
    }

    /// Like [`World::request_path`], to the cheapest reachable cell matching `predicate`.
    pub fn request_path_nearest(
        &mut self,
        agent: u64,
        predicate: GoalPredicate,
        through_fog: bool,
    ) -> Option<PathTicket> {
        let origin = self.location(agent)?;
        Some(self.submit(
            origin,
            PathGoal::Nearest(predicate),
            through_fog,
            Requester::Agent(agent),
        ))
    }

    /// Plan from `from` to `to` and run `on_finish` on the simulation thread when done.
    pub fn path(
        &mut self,
        from: Cell,
        to: Cell,
        through_fog: bool,
        on_finish: impl FnOnce(&mut World<D>, PathOutcome) + 'static,
    ) -> PathTicket {
        self.submit(
            from,
            PathGoal::Cell(to),
            through_fog,
            Requester::Callback(Box::new(on_finish)),
        )
    }

    pub fn path_nearest(
        &mut self,
        from: Cell,
        predicate: GoalPredicate,
        through_fog: bool,
        on_finish: impl FnOnce(&mut World<D>, PathOutcome) + 'static,
    ) -> PathTicket {
        self.submit(
            from,
            PathGoal::Nearest(predicate),
            through_fog,
            Requester::Callback(Box::new(on_finish)),
        )
    }

    /// Discard the result of one outstanding request. Other requests from the same agent are
    /// unaffected. Returns `false` if the request already completed or was never made.
    pub fn cancel_path(&mut self, ticket: PathTicket) -> bool {
        match self.pending.get_mut(&ticket) {
            Some(pending) => {
                pending.cancelled = true;
                true
            }
            None => false,
        }
    }

    /// Discard every outstanding request made on behalf of `agent`.
    pub fn cancel_paths(&mut self, agent: u64) {
        *self.generations.entry(agent).or_default() += 1;
    }

    /// Requests submitted but not yet applied.
    pub fn pending_paths(&self) -> usize {
        self.pending.len()
    }

    /// Block until every outstanding request has been applied, waiting at most `timeout` for
    /// each. Returns how many were applied.
    pub fn settle_paths(&mut self, timeout: Duration) -> usize {
        let mut applied = 0;
        while !self.pending.is_empty() {
            let Some(done) = self.planner.wait(timeout) else {
                break;
            };
            self.apply_completed(done);
            applied += 1;
        }
        applied
    }

    pub(crate) fn apply_path_results(&mut self) {
        for done in self.planner.try_drain() {
            self.apply_completed(done);
        }
    }

    fn submit(
        &mut self,
        origin: Cell,
        goal: PathGoal,
        through_fog: bool,
        requester: Requester<D>,
    ) -> PathTicket {
        let generation = match &requester {
            Requester::Agent(agent) => self.generation(*agent),
            Requester::Callback(_) => 0,
        };
        let grid = self.grid_snapshot();
        let ticket = self.planner.submit(origin, goal, through_fog, grid);
        self.pending.insert(
            ticket,
            PendingPath {
                requester,
                generation,
                cancelled: false,
            },
        );
        ticket
    }

    fn generation(&self, agent: u64) -> u64 {
        self.generations.get(&agent).copied().unwrap_or(0)
    }

    fn apply_completed(&mut self, done: Completed) {
        let Some(pending) = self.pending.remove(&done.id) else {
            return;
        };
        if pending.cancelled {
            trace!(ticket = done.id.0, "cancelled path result discarded");
            return;
        }

        match pending.requester {
            Requester::Agent(agent) => {
                if pending.generation != self.generation(agent) || !self.contains(agent) {
                    trace!(agent, ticket = done.id.0, "stale path result discarded");
                    return;
                }
                let telegram = Telegram::to(agent, agent, PATH_READY).with_payload(PathReply {
                    ticket: done.id,
                    outcome: done.outcome,
                });
                self.deliver_to(agent, &telegram);
            }
            Requester::Callback(on_finish) => on_finish(self, done.outcome),
        }
    }
}
