//! Metrics source interface.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use tierscale_core::Metric;

/// One raw reading from the metrics backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Half-open look-back window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `length` leading up to `end`.
    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Self {
        let start = TimeDelta::from_std(length)
            .ok()
            .and_then(|delta| end.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Errors from the metrics backend.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("metrics backend unreachable: {0}")]
    Unreachable(String),

    #[error("metrics backend rejected credentials: {0}")]
    Unauthorized(String),

    #[error("malformed metrics response: {0}")]
    Malformed(String),

    #[error("unknown cluster: {0}")]
    UnknownCluster(String),
}

/// Supplies per-metric samples for a cluster.
///
/// An empty result means "no data in the window" and is not an error.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn get_samples(
        &self,
        cluster_id: &str,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<Vec<Sample>, SourceError>;
}
