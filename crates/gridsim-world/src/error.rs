use gridsim_nav::{GridError, PathWorkerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("failed to start path planner: {0}")]
    Planner(#[from] PathWorkerError),

    #[error(transparent)]
    Grid(#[from] GridError),
}
