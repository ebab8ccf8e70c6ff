use core::fmt;
use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::{State, StateContext, StateKind, Transition, WorldMut};

/// Upper bound on transitions applied in response to a single callback.
pub const DEFAULT_TRANSITION_LIMIT: usize = 64;

/// Per-agent state machine: one current state, an optional global state executed alongside it,
/// and the previous state recorded by the last revertable transition.
///
/// There is no transition table; states change the machine from inside their own callbacks.
pub struct StateMachine<W>
where
    W: WorldMut + 'static,
{
    current: Option<Box<dyn State<W>>>,
    global: Option<Box<dyn State<W>>>,
    previous: Option<Box<dyn State<W>>>,
    started: bool,
    transition_limit: usize,
}

impl<W> StateMachine<W>
where
    W: WorldMut + 'static,
{
    pub fn new(initial: Box<dyn State<W>>) -> Self {
        Self {
            current: Some(initial),
            global: None,
            previous: None,
            started: false,
            transition_limit: DEFAULT_TRANSITION_LIMIT,
        }
    }

    pub fn with_global(mut self, global: Box<dyn State<W>>) -> Self {
        self.global = Some(global);
        self
    }

    pub fn with_transition_limit(mut self, limit: usize) -> Self {
        self.transition_limit = limit.max(1);
        self
    }

    pub fn set_global(&mut self, global: Option<Box<dyn State<W>>>) {
        self.global = global;
    }

    /// Enter the initial state. Only the first call has an effect.
    pub fn start(&mut self, agent: W::Agent, world: &mut W) {
        if self.started {
            return;
        }
        self.started = true;
        self.call_current(agent, world, |state, ctx| state.enter(ctx));
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Advance by `step`: the global state executes first unless the current state ignores it,
    /// then the current state executes. Both receive the same step.
    pub fn update(&mut self, agent: W::Agent, world: &mut W, step: f32) {
        if !self.started {
            self.start(agent, world);
        }

        let suppress_global = self
            .current
            .as_ref()
            .is_some_and(|state| state.ignore_global());
        if !suppress_global {
            self.call_global(agent, world, |state, ctx| state.execute(ctx, step));
        }

        self.call_current(agent, world, |state, ctx| state.execute(ctx, step));
    }

    /// Offer `message` to the current state, then to the global state if it was not handled.
    pub fn handle_message(&mut self, agent: W::Agent, world: &mut W, message: &W::Message) -> bool {
        if self.call_current(agent, world, |state, ctx| state.on_message(ctx, message))
            == Some(true)
        {
            return true;
        }
        self.call_global(agent, world, |state, ctx| state.on_message(ctx, message)) == Some(true)
    }

    pub fn change_state(
        &mut self,
        agent: W::Agent,
        world: &mut W,
        state: Box<dyn State<W>>,
        exit_current: bool,
        revertable: bool,
    ) {
        self.apply(
            agent,
            world,
            Transition::Change {
                state,
                exit_current,
                revertable,
            },
        );
    }

    /// Return to the recorded previous state. Reverting does not record a new previous state,
    /// so a second revert without an intervening revertable change is a no-op.
    pub fn revert_state(&mut self, agent: W::Agent, world: &mut W) {
        self.apply(agent, world, Transition::Revert);
    }

    /// Apply a transition (and everything it chains) immediately.
    pub fn apply(&mut self, agent: W::Agent, world: &mut W, transition: Transition<W>) {
        self.apply_all(agent, world, vec![transition]);
    }

    /// `false` while the current state is executing its own callback.
    pub fn is_in_state(&self, kind: StateKind) -> bool {
        self.current
            .as_ref()
            .is_some_and(|state| state.is_kind(kind))
    }

    pub fn current_kind(&self) -> Option<StateKind> {
        self.current.as_ref().map(|state| state.kind())
    }

    pub fn global_kind(&self) -> Option<StateKind> {
        self.global.as_ref().map(|state| state.kind())
    }

    pub fn previous_kind(&self) -> Option<StateKind> {
        self.previous.as_ref().map(|state| state.kind())
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    fn call_current<R>(
        &mut self,
        agent: W::Agent,
        world: &mut W,
        f: impl FnOnce(&mut dyn State<W>, &mut StateContext<'_, W>) -> R,
    ) -> Option<R> {
        let mut state = self.current.take()?;
        let mut pending = Vec::new();
        let out = f(
            state.as_mut(),
            &mut StateContext::new(agent, world, &mut pending),
        );
        self.current = Some(state);
        self.apply_all(agent, world, pending);
        Some(out)
    }

    fn call_global<R>(
        &mut self,
        agent: W::Agent,
        world: &mut W,
        f: impl FnOnce(&mut dyn State<W>, &mut StateContext<'_, W>) -> R,
    ) -> Option<R> {
        let mut state = self.global.take()?;
        let mut pending = Vec::new();
        let out = f(
            state.as_mut(),
            &mut StateContext::new(agent, world, &mut pending),
        );
        self.global = Some(state);
        self.apply_all(agent, world, pending);
        Some(out)
    }

    fn apply_all(&mut self, agent: W::Agent, world: &mut W, pending: Vec<Transition<W>>) {
        if pending.is_empty() {
            return;
        }

        let mut queue: VecDeque<Transition<W>> = pending.into();
        let mut applied = 0usize;
        while let Some(transition) = queue.pop_front() {
            if applied >= self.transition_limit {
                warn!(
                    agent = ?agent,
                    dropped = queue.len() + 1,
                    limit = self.transition_limit,
                    "transition limit reached, dropping remaining transitions"
                );
                break;
            }
            applied += 1;

            // Transitions requested by enter/exit run before anything queued after the one
            // that triggered them.
            let chained = self.apply_one(agent, world, transition);
            for next in chained.into_iter().rev() {
                queue.push_front(next);
            }
        }
    }

    fn apply_one(
        &mut self,
        agent: W::Agent,
        world: &mut W,
        transition: Transition<W>,
    ) -> Vec<Transition<W>> {
        let mut chained = Vec::new();

        match transition {
            Transition::Change {
                mut state,
                exit_current,
                revertable,
            } => {
                if let Some(mut outgoing) = self.current.take() {
                    if exit_current {
                        outgoing.exit(&mut StateContext::new(agent, world, &mut chained));
                    }
                    if revertable && outgoing.revertable() {
                        self.previous = Some(outgoing);
                    }
                }

                trace!(
                    agent = ?agent,
                    to = %state.kind(),
                    exit_current,
                    revertable,
                    "state change"
                );
                state.enter(&mut StateContext::new(agent, world, &mut chained));
                self.current = Some(state);
            }
            Transition::Revert => {
                let Some(mut target) = self.previous.take() else {
                    trace!(agent = ?agent, "revert requested without a previous state");
                    return chained;
                };

                if let Some(mut outgoing) = self.current.take() {
                    outgoing.exit(&mut StateContext::new(agent, world, &mut chained));
                }

                trace!(agent = ?agent, to = %target.kind(), "state revert");
                target.enter(&mut StateContext::new(agent, world, &mut chained));
                self.current = Some(target);
            }
        }

        chained
    }
}

impl<W> fmt::Debug for StateMachine<W>
where
    W: WorldMut + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current_kind())
            .field("global", &self.global_kind())
            .field("previous", &self.previous_kind())
            .field("started", &self.started)
            .finish()
    }
}
