//! Bounded history of recent snapshots across all clusters.
//!
//! Only the status reporter reads this. Scaling decisions always use the
//! snapshot collected on the current tick.

use std::collections::VecDeque;

use tierscale_core::Snapshot;

/// Ring buffer of snapshots; the oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Most recent snapshot recorded for `cluster_id`.
    pub fn latest_for(&self, cluster_id: &str) -> Option<&Snapshot> {
        self.entries.iter().rev().find(|s| s.cluster_id == cluster_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snap(cluster: &str, cpu: f64) -> Snapshot {
        Snapshot {
            cluster_id: cluster.to_string(),
            captured_at: Utc::now(),
            cpu_pct: cpu,
            connections: 0.0,
            iops: 0.0,
            memory_pct: 0.0,
        }
    }

    #[test]
    fn latest_for_returns_newest_matching() {
        let mut history = MetricsHistory::new(10);
        history.push(snap("orders", 10.0));
        history.push(snap("billing", 20.0));
        history.push(snap("orders", 30.0));

        assert_eq!(history.latest_for("orders").unwrap().cpu_pct, 30.0);
        assert_eq!(history.latest_for("billing").unwrap().cpu_pct, 20.0);
        assert!(history.latest_for("search").is_none());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut history = MetricsHistory::new(2);
        history.push(snap("orders", 1.0));
        history.push(snap("billing", 2.0));
        history.push(snap("search", 3.0));

        assert!(history.latest_for("orders").is_none());
        assert_eq!(history.latest_for("billing").unwrap().cpu_pct, 2.0);
        assert_eq!(history.latest_for("search").unwrap().cpu_pct, 3.0);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut history = MetricsHistory::new(0);
        history.push(snap("billing", 1.0));
        history.push(snap("orders", 2.0));
        assert!(history.latest_for("billing").is_none());
        assert_eq!(history.latest_for("orders").unwrap().cpu_pct, 2.0);
    }
}
