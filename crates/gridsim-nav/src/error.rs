use std::io;

use thiserror::Error;

use crate::Cell;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("cell {cell} is outside the {width}x{height} grid")]
    OutOfBounds { cell: Cell, width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum PathWorkerError {
    #[error("failed to spawn path worker {index}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
}
