use crate::AgentId;

/// Read-only world access.
///
/// The kernel does not prescribe which queries a world must expose; it only needs to know how
/// agents are addressed and what a message looks like. Subsystems (bus, navigation) define
/// their own queries on the concrete world type.
pub trait WorldView {
    type Agent: AgentId;
    type Message;
}

/// Write access / effect sink.
pub trait WorldMut: WorldView {}
