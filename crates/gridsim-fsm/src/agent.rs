use core::fmt::Debug;

/// Identifier for an agent.
///
/// `Ord` doubles as registration order when ids are assigned sequentially, which keeps
/// per-tick iteration deterministic.
pub trait AgentId: Copy + Ord + Eq + Debug {}

impl AgentId for u64 {}
