//! Resize executor interface.

use async_trait::async_trait;
use thiserror::Error;

use tierscale_core::Size;

/// What the executor said about a resize request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeOutcome {
    Accepted,
    Rejected(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("resize backend unreachable: {0}")]
    Unreachable(String),

    #[error("resize backend error: {0}")]
    Backend(String),
}

/// Performs capacity changes out of process and reports the current size.
///
/// `get_current_size` must read the authoritative value; callers never
/// cache it between ticks.
#[async_trait]
pub trait ResizeExecutor: Send + Sync {
    async fn get_current_size(&self, cluster_id: &str) -> Result<Size, ExecutorError>;

    async fn resize(&self, cluster_id: &str, target: &Size) -> Result<ResizeOutcome, ExecutorError>;
}
