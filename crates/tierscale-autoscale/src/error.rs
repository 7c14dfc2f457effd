use std::time::Duration;

use thiserror::Error;

use tierscale_core::LadderError;

use crate::executor::ExecutorError;

/// Errors surfaced by manual operations on the orchestrator.
///
/// The automatic tick never returns these; it reports a `TickOutcome`.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error(transparent)]
    Ladder(#[from] LadderError),

    #[error("cannot read current size of {cluster}: {source}")]
    SizeLookup {
        cluster: String,
        #[source]
        source: ExecutorError,
    },

    #[error("{operation} for {cluster} timed out after {timeout:?}")]
    Timeout {
        cluster: String,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("resize of {cluster} failed: {reason}")]
    Execution { cluster: String, reason: String },
}

pub type ScaleResult<T> = Result<T, ScaleError>;
