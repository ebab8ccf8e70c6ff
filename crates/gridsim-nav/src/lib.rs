//! Grid navigation: a weighted, fog-aware 2D grid, the search algorithms that run over it and
//! a worker pool that runs those searches off the simulation thread.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod cell;
pub mod error;
pub mod grid;
pub mod heuristic;
pub mod search;
pub mod terrain;
pub mod worker;

pub use cell::{Adjacency, Cell};
pub use error::{GridError, PathWorkerError};
pub use grid::{Grid, Tile, TileChange, TileObserver};
pub use heuristic::Heuristic;
pub use search::{
    a_star_search, brute_force_search, dijkstras_nearest, reconstruct, PathOutcome, SearchOptions,
};
pub use terrain::Terrain;
pub use worker::{
    Completed, GoalPredicate, PathGoal, PathRequest, PathWorker, PlannerSettings, RequestId,
};
