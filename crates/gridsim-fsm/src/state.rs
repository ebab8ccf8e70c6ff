use core::fmt;

use crate::WorldMut;

/// Type tag identifying a state's behaviour.
///
/// Used for introspection (`is_in_state`) instead of runtime type checks. A state may report
/// several kinds through [`State::is_kind`] to behave like a specialisation of a base state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKind(pub &'static str);

impl StateKind {
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One behaviour an agent can be in.
///
/// All callbacks receive a [`StateContext`] giving access to the agent id, the world and the
/// transition requests. Transitions requested from a callback are applied, in request order,
/// once the callback returns.
pub trait State<W>: 'static
where
    W: WorldMut + 'static,
{
    fn kind(&self) -> StateKind;

    /// Whether this state should be reported as `kind`. Override to also match a base kind.
    fn is_kind(&self, kind: StateKind) -> bool {
        self.kind() == kind
    }

    /// Suppress the global state's `execute` while this state is current.
    fn ignore_global(&self) -> bool {
        false
    }

    /// Whether this state may be recorded as the previous state when it is left.
    ///
    /// Transient states (a walk, a short break) return `false` so that reverting out of them
    /// restores the task they interrupted rather than the interruption itself.
    fn revertable(&self) -> bool {
        true
    }

    fn enter(&mut self, _ctx: &mut StateContext<'_, W>) {}

    fn execute(&mut self, _ctx: &mut StateContext<'_, W>, _step: f32) {}

    fn exit(&mut self, _ctx: &mut StateContext<'_, W>) {}

    /// Returns `true` if the message was handled. Unhandled messages fall through from the
    /// current state to the global state.
    fn on_message(&mut self, _ctx: &mut StateContext<'_, W>, _message: &W::Message) -> bool {
        false
    }
}

/// A state change requested by a callback or applied by the owner of the machine.
pub enum Transition<W>
where
    W: WorldMut + 'static,
{
    Change {
        state: Box<dyn State<W>>,
        exit_current: bool,
        revertable: bool,
    },
    Revert,
}

impl<W> Transition<W>
where
    W: WorldMut + 'static,
{
    /// The default transition: exit the current state and record it as previous.
    pub fn change(state: Box<dyn State<W>>) -> Self {
        Self::Change {
            state,
            exit_current: true,
            revertable: true,
        }
    }
}

impl<W> fmt::Debug for Transition<W>
where
    W: WorldMut + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Change {
                state,
                exit_current,
                revertable,
            } => f
                .debug_struct("Change")
                .field("state", &state.kind())
                .field("exit_current", exit_current)
                .field("revertable", revertable)
                .finish(),
            Transition::Revert => f.write_str("Revert"),
        }
    }
}

/// Handle passed to state callbacks.
///
/// The state being called is checked out of its machine for the duration of the callback, so
/// transitions are recorded here and applied by the machine afterwards.
pub struct StateContext<'a, W>
where
    W: WorldMut + 'static,
{
    pub agent: W::Agent,
    pub world: &'a mut W,
    pending: &'a mut Vec<Transition<W>>,
}

impl<'a, W> StateContext<'a, W>
where
    W: WorldMut + 'static,
{
    pub fn new(agent: W::Agent, world: &'a mut W, pending: &'a mut Vec<Transition<W>>) -> Self {
        Self {
            agent,
            world,
            pending,
        }
    }

    /// Exit the current state, record it as previous (if revertable) and enter `state`.
    pub fn change_state(&mut self, state: Box<dyn State<W>>) {
        self.pending.push(Transition::change(state));
    }

    pub fn change_state_with(
        &mut self,
        state: Box<dyn State<W>>,
        exit_current: bool,
        revertable: bool,
    ) {
        self.pending.push(Transition::Change {
            state,
            exit_current,
            revertable,
        });
    }

    /// Layer `state` on top of the current one without exiting it; reverting resumes the
    /// interrupted state.
    pub fn layer_state(&mut self, state: Box<dyn State<W>>) {
        self.change_state_with(state, false, true);
    }

    pub fn revert_state(&mut self) {
        self.pending.push(Transition::Revert);
    }

    pub fn has_pending_transition(&self) -> bool {
        !self.pending.is_empty()
    }
}
