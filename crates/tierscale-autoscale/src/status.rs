//! Read-only status reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tierscale_core::{ClusterId, ScalingEvent, Snapshot, Thresholds};

use crate::evaluator::{Recommendation, evaluate, is_healthy};
use crate::events::{ClusterLedger, EVENT_RETENTION};

/// Number of scaling events included per cluster.
pub const RECENT_EVENT_LIMIT: usize = 5;

/// Externally observable state, keyed by cluster id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub clusters: BTreeMap<ClusterId, ClusterStatus>,
}

impl StatusReport {
    /// Clusters with a snapshot that passes the health check.
    pub fn healthy_count(&self) -> usize {
        self.clusters
            .values()
            .filter(|c| c.healthy == Some(true))
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// `None` until the cluster has been collected at least once.
    pub latest: Option<Snapshot>,
    pub healthy: Option<bool>,
    /// What the evaluator would say about `latest` right now.
    pub recommendation: Option<Recommendation>,
    pub scaling_enabled: bool,
    /// Scaling events, successful or not, in the trailing 24 hours.
    pub events_24h: usize,
    pub recent_events: Vec<ScalingEvent>,
}

impl ClusterStatus {
    pub fn build(
        latest: Option<&Snapshot>,
        ledger: &ClusterLedger,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> Self {
        let since = now - EVENT_RETENTION;
        Self {
            latest: latest.cloned(),
            healthy: latest.map(|s| is_healthy(s, thresholds)),
            recommendation: latest.map(|s| evaluate(s, thresholds)),
            scaling_enabled: ledger.scaling_enabled,
            events_24h: ledger.events.since(since).count(),
            recent_events: ledger.events.recent(since, RECENT_EVENT_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tierscale_core::{ScalingAction, ScalingOutcome, Size};

    fn snapshot(cpu: f64) -> Snapshot {
        Snapshot {
            cluster_id: "orders".to_string(),
            captured_at: Utc::now(),
            cpu_pct: cpu,
            connections: 500.0,
            iops: 500.0,
            memory_pct: 50.0,
        }
    }

    #[test]
    fn never_collected_cluster_has_no_snapshot() {
        let status = ClusterStatus::build(
            None,
            &ClusterLedger::new(true),
            &Thresholds::default(),
            Utc::now(),
        );
        assert!(status.latest.is_none());
        assert!(status.healthy.is_none());
        assert!(status.recommendation.is_none());
        assert_eq!(status.events_24h, 0);
    }

    #[test]
    fn status_reevaluates_latest_snapshot() {
        let snap = snapshot(92.0);
        let status = ClusterStatus::build(
            Some(&snap),
            &ClusterLedger::new(false),
            &Thresholds::default(),
            Utc::now(),
        );
        assert_eq!(status.healthy, Some(false));
        assert!(matches!(
            status.recommendation,
            Some(Recommendation::ScaleUp { .. })
        ));
        assert!(!status.scaling_enabled);
    }

    #[test]
    fn counts_window_and_caps_tail() {
        let now = Utc::now();
        let mut ledger = ClusterLedger::new(true);
        for i in 0..7 {
            ledger.record(ScalingEvent {
                cluster_id: "orders".to_string(),
                timestamp: now - TimeDelta::hours(7 - i),
                action: ScalingAction::ScaleUp,
                from_size: Size::from("M10"),
                to_size: Size::from("M20"),
                reason: format!("event {i}"),
                outcome: ScalingOutcome::Success,
            });
        }

        let status = ClusterStatus::build(None, &ledger, &Thresholds::default(), now);
        assert_eq!(status.events_24h, 7);
        assert_eq!(status.recent_events.len(), RECENT_EVENT_LIMIT);
        assert_eq!(status.recent_events[4].reason, "event 6");

        let mut report = StatusReport {
            generated_at: now,
            clusters: BTreeMap::new(),
        };
        report.clusters.insert("orders".to_string(), status);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["clusters"]["orders"]["events_24h"], 7);
        assert_eq!(report.healthy_count(), 0);
    }
}
