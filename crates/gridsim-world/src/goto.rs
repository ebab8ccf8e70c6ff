use std::collections::VecDeque;

use gridsim_fsm::{State, StateKind};
use gridsim_nav::{Cell, GoalPredicate};
use tracing::trace;

use crate::{BoxedState, Context, PathReply, PathTicket, Telegram, World, ARRIVAL, PATH_FAILED, PATH_READY};

pub const GOTO: StateKind = StateKind("goto");

enum Destination {
    Cell(Cell),
    Nearest(GoalPredicate),
    /// Precomputed route; no planning needed.
    Route(Vec<Cell>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Walking,
    Done,
}

/// Walks the agent along a path.
///
/// Not revertable: entering it from a task and reverting afterwards resumes the task. On
/// arrival it changes to the follow-up state (or reverts) and broadcasts [`ARRIVAL`]; when no
/// path exists it changes to the failure state (or reverts) and broadcasts [`PATH_FAILED`].
pub struct Goto<D: 'static> {
    destination: Destination,
    through_fog: bool,
    on_arrive: Option<BoxedState<D>>,
    on_fail: Option<BoxedState<D>>,
    route: VecDeque<Cell>,
    progress: f32,
    ticket: Option<PathTicket>,
    phase: Phase,
}

impl<D: 'static> Goto<D> {
    fn with_destination(destination: Destination) -> Self {
        Self {
            destination,
            through_fog: false,
            on_arrive: None,
            on_fail: None,
            route: VecDeque::new(),
            progress: 0.0,
            ticket: None,
            phase: Phase::Planning,
        }
    }

    pub fn to(cell: Cell) -> Self {
        Self::with_destination(Destination::Cell(cell))
    }

    pub fn nearest(predicate: GoalPredicate) -> Self {
        Self::with_destination(Destination::Nearest(predicate))
    }

    pub fn along(route: Vec<Cell>) -> Self {
        Self::with_destination(Destination::Route(route))
    }

    pub fn through_fog(mut self, allowed: bool) -> Self {
        self.through_fog = allowed;
        self
    }

    /// State to enter on arrival instead of reverting.
    pub fn then(mut self, state: BoxedState<D>) -> Self {
        self.on_arrive = Some(state);
        self
    }

    /// State to enter when no path exists instead of reverting.
    pub fn or_else(mut self, state: BoxedState<D>) -> Self {
        self.on_fail = Some(state);
        self
    }

    pub fn boxed(self) -> BoxedState<D> {
        Box::new(self)
    }

    fn start_walking(&mut self, location: Cell, path: Vec<Cell>) {
        self.route = path.into_iter().skip_while(|&cell| cell == location).collect();
        self.progress = 0.0;
        self.phase = Phase::Walking;
    }

    fn arrive(&mut self, ctx: &mut Context<'_, D>) {
        self.phase = Phase::Done;
        let Some(location) = ctx.world.location(ctx.agent) else {
            return;
        };
        trace!(agent = ctx.agent, %location, "arrived");
        match self.on_arrive.take() {
            Some(next) => ctx.change_state(next),
            None => ctx.revert_state(),
        }
        ctx.world.dispatch(
            Telegram::broadcast(ctx.agent, ARRIVAL).with_payload(location),
            0.0,
        );
    }

    fn abort(&mut self, ctx: &mut Context<'_, D>) {
        self.phase = Phase::Done;
        let Some(location) = ctx.world.location(ctx.agent) else {
            return;
        };
        trace!(agent = ctx.agent, %location, "no path");
        match self.on_fail.take() {
            Some(next) => ctx.change_state(next),
            None => ctx.revert_state(),
        }
        ctx.world.dispatch(
            Telegram::broadcast(ctx.agent, PATH_FAILED).with_payload(location),
            0.0,
        );
    }
}

impl<D: 'static> State<World<D>> for Goto<D> {
    fn kind(&self) -> StateKind {
        GOTO
    }

    fn revertable(&self) -> bool {
        false
    }

    fn enter(&mut self, ctx: &mut Context<'_, D>) {
        let agent = ctx.agent;
        let Some(location) = ctx.world.location(agent) else {
            return;
        };
        if let Destination::Route(route) = &self.destination {
            let route = route.clone();
            self.start_walking(location, route);
            return;
        }
        self.ticket = match &self.destination {
            Destination::Cell(goal) => ctx.world.request_path(agent, *goal, self.through_fog),
            Destination::Nearest(predicate) => {
                ctx.world
                    .request_path_nearest(agent, predicate.clone(), self.through_fog)
            }
            Destination::Route(_) => None,
        };
    }

    fn execute(&mut self, ctx: &mut Context<'_, D>, step: f32) {
        if self.phase != Phase::Walking {
            return;
        }
        let Some(agent) = ctx.world.agent(ctx.agent) else {
            return;
        };
        let (mut location, speed) = (agent.location, agent.speed);

        let mut budget = speed * step;
        let mut obstructed = false;
        while let Some(&next) = self.route.front() {
            // Leaving a cell costs its weight; `progress` is the fraction already crossed.
            let cost = ctx.world.grid().cost(location).max(1) as f32;
            let remaining = (1.0 - self.progress) * cost;
            if budget < remaining {
                self.progress += budget / cost;
                break;
            }
            // Terrain may have changed under the planned route.
            if !ctx.world.grid().is_free(next) {
                obstructed = true;
                break;
            }
            budget -= remaining;
            self.progress = 0.0;
            self.route.pop_front();
            location = next;
        }

        if let Some(agent) = ctx.world.agent_mut(ctx.agent) {
            agent.location = location;
        }
        if obstructed {
            self.abort(ctx);
        } else if self.route.is_empty() {
            self.arrive(ctx);
        }
    }

    fn exit(&mut self, ctx: &mut Context<'_, D>) {
        if self.phase != Phase::Planning {
            return;
        }
        if let Some(ticket) = self.ticket.take() {
            ctx.world.cancel_path(ticket);
        }
    }

    fn on_message(&mut self, ctx: &mut Context<'_, D>, telegram: &Telegram) -> bool {
        if !telegram.is(PATH_READY) {
            return false;
        }
        let Some(reply) = telegram.payload::<PathReply>() else {
            return false;
        };
        if self.phase != Phase::Planning || Some(reply.ticket) != self.ticket {
            return false;
        }

        self.ticket = None;
        if !reply.outcome.success {
            self.abort(ctx);
            return true;
        }
        if let Some(location) = ctx.world.location(ctx.agent) {
            self.start_walking(location, reply.outcome.path.clone());
        }
        true
    }
}
