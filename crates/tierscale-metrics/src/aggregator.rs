//! Metrics aggregator: reduces a window of samples to one snapshot.
//!
//! All four metrics are requested concurrently under a single timeout.
//! There is no retry here: a failed collection skips the cluster for
//! this tick and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use tierscale_core::{Metric, Snapshot};

use crate::source::{MetricsSource, Sample, SourceError, TimeWindow};

/// Why a snapshot could not be produced.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("{metric} samples unavailable: {source}")]
    Source {
        metric: Metric,
        #[source]
        source: SourceError,
    },

    #[error("metrics collection timed out after {0:?}")]
    Timeout(Duration),
}

/// Pulls samples from a [`MetricsSource`] and averages them.
pub struct MetricsAggregator {
    source: Arc<dyn MetricsSource>,
    /// Look-back window per collection.
    lookback: Duration,
    /// Upper bound on one full collection.
    timeout: Duration,
}

impl MetricsAggregator {
    pub fn new(source: Arc<dyn MetricsSource>, lookback: Duration, timeout: Duration) -> Self {
        Self {
            source,
            lookback,
            timeout,
        }
    }

    /// Collect a snapshot for `cluster_id` over the window ending at `now`.
    pub async fn collect(
        &self,
        cluster_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, CollectionError> {
        let window = TimeWindow::trailing(now, self.lookback);

        let fetch = async {
            tokio::try_join!(
                self.mean_of(cluster_id, Metric::Cpu, window),
                self.mean_of(cluster_id, Metric::Connections, window),
                self.mean_of(cluster_id, Metric::Iops, window),
                self.mean_of(cluster_id, Metric::Memory, window),
            )
        };

        let (cpu_pct, connections, iops, memory_pct) = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| CollectionError::Timeout(self.timeout))??;

        Ok(Snapshot {
            cluster_id: cluster_id.to_string(),
            captured_at: now,
            cpu_pct,
            connections,
            iops,
            memory_pct,
        })
    }

    async fn mean_of(
        &self,
        cluster_id: &str,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<f64, CollectionError> {
        let samples = self
            .source
            .get_samples(cluster_id, metric, window)
            .await
            .map_err(|source| CollectionError::Source { metric, source })?;

        if samples.is_empty() {
            debug!(cluster = %cluster_id, %metric, "no samples in window, reading as 0");
        }
        Ok(mean(&samples))
    }
}

/// Arithmetic mean of the finite sample values; `0.0` when there are none.
pub fn mean(samples: &[Sample]) -> f64 {
    let (sum, count) = samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;

    /// In-memory source: fixed values per metric, optional failure or stall.
    #[derive(Default)]
    struct FakeSource {
        values: HashMap<Metric, Vec<f64>>,
        fail_on: Option<Metric>,
        stall: bool,
    }

    impl FakeSource {
        fn with(mut self, metric: Metric, values: &[f64]) -> Self {
            self.values.insert(metric, values.to_vec());
            self
        }
    }

    #[async_trait]
    impl MetricsSource for FakeSource {
        async fn get_samples(
            &self,
            _cluster_id: &str,
            metric: Metric,
            window: TimeWindow,
        ) -> Result<Vec<Sample>, SourceError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_on == Some(metric) {
                return Err(SourceError::Unreachable("connection refused".to_string()));
            }
            Ok(self
                .values
                .get(&metric)
                .map(|vals| vals.iter().map(|v| Sample::new(window.start, *v)).collect())
                .unwrap_or_default())
        }
    }

    fn aggregator(source: FakeSource) -> MetricsAggregator {
        MetricsAggregator::new(
            Arc::new(source),
            Duration::from_secs(300),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn averages_each_metric() {
        let source = FakeSource::default()
            .with(Metric::Cpu, &[90.0, 100.0])
            .with(Metric::Connections, &[10.0, 20.0, 30.0])
            .with(Metric::Iops, &[500.0])
            .with(Metric::Memory, &[40.0, 60.0]);

        let now = Utc::now();
        let snap = aggregator(source).collect("orders", now).await.unwrap();

        assert_eq!(snap.cluster_id, "orders");
        assert_eq!(snap.captured_at, now);
        assert_eq!(snap.cpu_pct, 95.0);
        assert_eq!(snap.connections, 20.0);
        assert_eq!(snap.iops, 500.0);
        assert_eq!(snap.memory_pct, 50.0);
    }

    #[tokio::test]
    async fn missing_metric_reads_as_zero() {
        let source = FakeSource::default().with(Metric::Cpu, &[42.0]);

        let snap = aggregator(source).collect("orders", Utc::now()).await.unwrap();
        assert_eq!(snap.cpu_pct, 42.0);
        assert_eq!(snap.connections, 0.0);
        assert_eq!(snap.iops, 0.0);
        assert_eq!(snap.memory_pct, 0.0);
    }

    #[tokio::test]
    async fn source_error_fails_collection() {
        let source = FakeSource {
            fail_on: Some(Metric::Iops),
            ..FakeSource::default().with(Metric::Cpu, &[10.0])
        };

        let err = aggregator(source).collect("orders", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CollectionError::Source { metric: Metric::Iops, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_times_out() {
        let source = FakeSource {
            stall: true,
            ..FakeSource::default()
        };

        let err = aggregator(source).collect("orders", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CollectionError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn mean_ignores_non_finite() {
        let now = Utc::now();
        let samples = [
            Sample::new(now, 10.0),
            Sample::new(now, f64::NAN),
            Sample::new(now, 30.0),
        ];
        assert_eq!(mean(&samples), 20.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
