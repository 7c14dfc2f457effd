//! File-backed fleet adapter.
//!
//! A JSON document describing each cluster's current size and recent
//! metric samples. It serves as both the metrics source and the resize
//! executor, so the daemon can be driven end to end without a cloud
//! account:
//!
//! ```json
//! {
//!   "clusters": {
//!     "orders": {
//!       "size": "M10",
//!       "metrics": { "cpu": [91.0, 97.5], "connections": [120] }
//!     }
//!   }
//! }
//! ```
//!
//! Bare numbers count as inside every look-back window; samples written
//! as `{"timestamp": .., "value": ..}` are filtered by it. A cluster with
//! `"frozen": true` rejects resizes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use tierscale_autoscale::{ExecutorError, ResizeExecutor, ResizeOutcome};
use tierscale_core::{Metric, Size};
use tierscale_metrics::{MetricsSource, Sample, SourceError, TimeWindow};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fleet file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetState {
    #[serde(default)]
    pub clusters: BTreeMap<String, FleetCluster>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetCluster {
    pub size: Size,
    #[serde(default)]
    pub metrics: FleetMetrics,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub frozen: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetMetrics {
    #[serde(default)]
    pub cpu: Vec<FleetSample>,
    #[serde(default)]
    pub connections: Vec<FleetSample>,
    #[serde(default)]
    pub iops: Vec<FleetSample>,
    #[serde(default)]
    pub memory: Vec<FleetSample>,
}

impl FleetMetrics {
    pub fn get(&self, metric: Metric) -> &[FleetSample] {
        match metric {
            Metric::Cpu => &self.cpu,
            Metric::Connections => &self.connections,
            Metric::Iops => &self.iops,
            Metric::Memory => &self.memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FleetSample {
    Value(f64),
    Timed { timestamp: DateTime<Utc>, value: f64 },
}

impl FleetSample {
    fn in_window(&self, window: &TimeWindow) -> Option<Sample> {
        match *self {
            FleetSample::Value(value) => Some(Sample::new(window.start, value)),
            FleetSample::Timed { timestamp, value } => {
                window.contains(timestamp).then(|| Sample::new(timestamp, value))
            }
        }
    }
}

impl FleetState {
    /// A small fleet for `init-config`.
    pub fn sample(clusters: &[&str]) -> Self {
        let clusters = clusters
            .iter()
            .map(|id| {
                let cluster = FleetCluster {
                    size: Size::from("M10"),
                    metrics: FleetMetrics {
                        cpu: vec![FleetSample::Value(45.0)],
                        connections: vec![FleetSample::Value(250.0)],
                        iops: vec![FleetSample::Value(300.0)],
                        memory: vec![FleetSample::Value(55.0)],
                    },
                    frozen: false,
                };
                (id.to_string(), cluster)
            })
            .collect();
        Self { clusters }
    }
}

/// The fleet document on disk. Reads are not cached; every call sees the
/// file as it is now.
pub struct FleetFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FleetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<FleetState, FleetError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FleetError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| FleetError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a temporary file so readers never see a partial document.
    pub async fn store(&self, state: &FleetState) -> Result<(), FleetError> {
        let io_err = |source| FleetError::Io {
            path: self.path.clone(),
            source,
        };
        let body = serde_json::to_vec_pretty(state).map_err(|source| FleetError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)
    }
}

impl From<FleetError> for SourceError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::Io { .. } => SourceError::Unreachable(e.to_string()),
            FleetError::Parse { .. } => SourceError::Malformed(e.to_string()),
        }
    }
}

impl From<FleetError> for ExecutorError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::Io { .. } => ExecutorError::Unreachable(e.to_string()),
            FleetError::Parse { .. } => ExecutorError::Backend(e.to_string()),
        }
    }
}

#[async_trait]
impl MetricsSource for FleetFile {
    async fn get_samples(
        &self,
        cluster_id: &str,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<Vec<Sample>, SourceError> {
        let state = self.load().await?;
        let cluster = state
            .clusters
            .get(cluster_id)
            .ok_or_else(|| SourceError::UnknownCluster(cluster_id.to_string()))?;

        Ok(cluster
            .metrics
            .get(metric)
            .iter()
            .filter_map(|s| s.in_window(&window))
            .collect())
    }
}

#[async_trait]
impl ResizeExecutor for FleetFile {
    async fn get_current_size(&self, cluster_id: &str) -> Result<Size, ExecutorError> {
        let state = self.load().await?;
        state
            .clusters
            .get(cluster_id)
            .map(|c| c.size.clone())
            .ok_or_else(|| ExecutorError::UnknownCluster(cluster_id.to_string()))
    }

    async fn resize(&self, cluster_id: &str, target: &Size) -> Result<ResizeOutcome, ExecutorError> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;

        let Some(cluster) = state.clusters.get_mut(cluster_id) else {
            return Err(ExecutorError::UnknownCluster(cluster_id.to_string()));
        };
        if cluster.frozen {
            return Ok(ResizeOutcome::Rejected(format!("{cluster_id} is frozen")));
        }

        debug!(cluster = %cluster_id, from = %cluster.size, to = %target, "rewriting fleet file");
        cluster.size = target.clone();
        self.store(&state).await?;
        Ok(ResizeOutcome::Accepted)
    }
}
