//! Error types for grid mapping
//!
//! Every failure of a map call surfaces as a [`MapError`]. There is no partial
//! success mode: whatever rows were produced before the failure are dropped.

use std::time::Duration;
use thiserror::Error;

/// Boxed error carried by [`MapError::TransformFailed`]
pub type TransformError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a partitioned map call
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MapError {
    /// The waiting call was interrupted before every band finished
    #[error("interrupted while waiting for bands to complete")]
    Interrupted,

    /// The transform failed (returned an error or panicked) on a cell
    #[error("transform failed in band {band} at ({x}, {y}): {source}")]
    TransformFailed {
        band: usize,
        x: usize,
        y: usize,
        #[source]
        source: TransformError,
    },

    /// The wait ceiling elapsed before every band finished
    #[error("bands did not complete within {after:?}")]
    TimedOut { after: Duration },

    /// The executor refused new work because it has been shut down
    #[error("worker pool is shut down")]
    PoolClosed,

    /// A worker thread could not be started
    #[error("failed to start worker: {0}")]
    SpawnFailed(String),

    /// A band task went away without reporting a result
    #[error("band {band} was lost before reporting a result")]
    WorkerLost { band: usize },

    /// Grid construction received inconsistent dimensions
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

impl MapError {
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Cell coordinates of a transform failure, if this is one
    pub fn coordinates(&self) -> Option<(usize, usize)> {
        match self {
            Self::TransformFailed { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }
}

/// Error used when a transform panics instead of returning an error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transform panicked: {message}")]
pub struct TransformPanic {
    pub message: String,
}

impl TransformPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}
