//! Umbrella crate that re-exports the `gridsim-*` building blocks.
//!
//! [`fsm`] holds the agent state machine, [`nav`] the weighted grid and path planners, and
//! [`world`] ties both together into a ticking simulation with a message bus.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "fsm")]
#[cfg_attr(docsrs, doc(cfg(feature = "fsm")))]
pub use gridsim_fsm as fsm;

#[cfg(feature = "nav")]
#[cfg_attr(docsrs, doc(cfg(feature = "nav")))]
pub use gridsim_nav as nav;

#[cfg(feature = "world")]
#[cfg_attr(docsrs, doc(cfg(feature = "world")))]
pub use gridsim_world as world;

/// The names most simulations need.
#[cfg(feature = "world")]
#[cfg_attr(docsrs, doc(cfg(feature = "world")))]
pub mod prelude {
    pub use gridsim_fsm::{State, StateKind};
    pub use gridsim_nav::{Adjacency, Cell, GoalPredicate, Grid, Heuristic, PathOutcome, Terrain};
    pub use gridsim_world::{
        Context, Goto, PathReply, Recipients, Spawn, Telegram, World, WorldConfig, ARRIVAL,
        PATH_FAILED, PATH_READY,
    };
}
