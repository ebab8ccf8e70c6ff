//! The simulation world: agent registry, telegram bus with scheduled delivery, and routing of
//! path requests between agents and the background planner.
//!
//! Each agent is driven by a [`gridsim_fsm::StateMachine`] over [`World`]. States reach the
//! world, their own [`Agent`] record and the bus through the callback context.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod config;
pub mod error;
pub mod goto;
pub mod paths;
pub mod telegram;
pub mod world;

pub use agent::{Agent, Spawn};
pub use config::WorldConfig;
pub use error::WorldError;
pub use goto::{Goto, GOTO};
pub use paths::PathTicket;
pub use telegram::{MessageKind, PathReply, Recipients, Telegram, ARRIVAL, PATH_FAILED, PATH_READY};
pub use world::{BoxedState, Context, World};
