//! Finite-state machine kernel for grid simulation agents.
//!
//! Every agent owns one [`StateMachine`] holding a current, a global and a previous state.
//! States are trait objects implementing [`State`]; transitions are explicit calls made from
//! inside a state's own logic through the [`StateContext`] handed to every callback.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod machine;
pub mod rng;
pub mod state;
pub mod world;

pub use agent::AgentId;
pub use machine::{StateMachine, DEFAULT_TRANSITION_LIMIT};
pub use rng::{derive_seed, DeterministicRng, SplitMix64};
pub use state::{State, StateContext, StateKind, Transition};
pub use world::{WorldMut, WorldView};
