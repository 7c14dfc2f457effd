//! Threshold evaluation.
//!
//! Scale-up fires when *any* metric is at or above its high threshold;
//! scale-down needs *every* metric at or below its low threshold. The
//! asymmetry is the hysteresis that keeps a cluster from flapping between
//! adjacent tiers.

use serde::{Deserialize, Serialize};

use tierscale_core::{Direction, Metric, ScalingAction, Snapshot, Thresholds};

/// The evaluator's verdict for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recommendation {
    NoChange,
    ScaleUp { reason: String },
    ScaleDown { reason: String },
}

impl Recommendation {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Recommendation::NoChange => None,
            Recommendation::ScaleUp { .. } => Some(Direction::Up),
            Recommendation::ScaleDown { .. } => Some(Direction::Down),
        }
    }

    pub fn action(&self) -> Option<ScalingAction> {
        match self {
            Recommendation::NoChange => None,
            Recommendation::ScaleUp { .. } => Some(ScalingAction::ScaleUp),
            Recommendation::ScaleDown { .. } => Some(ScalingAction::ScaleDown),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Recommendation::NoChange => None,
            Recommendation::ScaleUp { reason } | Recommendation::ScaleDown { reason } => {
                Some(reason)
            }
        }
    }
}

/// Classify a snapshot. Scale-up is checked first.
pub fn evaluate(snapshot: &Snapshot, thresholds: &Thresholds) -> Recommendation {
    let tripped: Vec<String> = high_metrics(snapshot, thresholds)
        .map(|metric| {
            format!(
                "High {}: {}",
                metric.label(),
                metric.format_value(snapshot.value(metric))
            )
        })
        .collect();

    if !tripped.is_empty() {
        return Recommendation::ScaleUp {
            reason: tripped.join("; "),
        };
    }

    let all_low = Metric::ALL
        .iter()
        .all(|m| snapshot.value(*m) <= thresholds.get(*m).low);

    if all_low {
        return Recommendation::ScaleDown {
            reason: scale_down_reason(snapshot),
        };
    }

    Recommendation::NoChange
}

/// A snapshot is healthy when no metric exceeds its high threshold.
pub fn is_healthy(snapshot: &Snapshot, thresholds: &Thresholds) -> bool {
    Metric::ALL
        .iter()
        .all(|m| snapshot.value(*m) <= thresholds.get(*m).high)
}

/// Alert lines for every metric at or above its high threshold.
pub fn alert_conditions(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<String> {
    high_metrics(snapshot, thresholds)
        .map(|metric| {
            let label = match metric {
                Metric::Cpu => "High CPU utilization",
                Metric::Connections => "High connection count",
                Metric::Iops => "High IOPS",
                Metric::Memory => "High memory utilization",
            };
            format!("{label}: {}", metric.format_value(snapshot.value(metric)))
        })
        .collect()
}

fn high_metrics<'a>(
    snapshot: &'a Snapshot,
    thresholds: &'a Thresholds,
) -> impl Iterator<Item = Metric> + 'a {
    Metric::ALL
        .into_iter()
        .filter(move |m| snapshot.value(*m) >= thresholds.get(*m).high)
}

fn scale_down_reason(snapshot: &Snapshot) -> String {
    format!(
        "Low resource utilization: CPU={}, Connections={}, IOPS={}, Memory={}",
        Metric::Cpu.format_value(snapshot.cpu_pct),
        Metric::Connections.format_value(snapshot.connections),
        Metric::Iops.format_value(snapshot.iops),
        Metric::Memory.format_value(snapshot.memory_pct),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use tierscale_core::MetricThreshold;

    fn snapshot(cpu: f64, connections: f64, iops: f64, memory: f64) -> Snapshot {
        Snapshot {
            cluster_id: "orders".to_string(),
            captured_at: Utc::now(),
            cpu_pct: cpu,
            connections,
            iops,
            memory_pct: memory,
        }
    }

    #[test]
    fn single_hot_metric_scales_up() {
        let rec = evaluate(&snapshot(95.0, 10.0, 10.0, 10.0), &Thresholds::default());
        assert_eq!(
            rec,
            Recommendation::ScaleUp {
                reason: "High CPU: 95.0%".to_string()
            }
        );
        assert_eq!(rec.direction(), Some(Direction::Up));
    }

    #[test]
    fn reason_names_every_tripped_metric() {
        let rec = evaluate(&snapshot(95.0, 50.0, 1500.0, 90.0), &Thresholds::default());
        assert_eq!(
            rec.reason(),
            Some("High CPU: 95.0%; High IOPS: 1500; High memory: 90.0%")
        );
    }

    #[test]
    fn all_low_scales_down() {
        let rec = evaluate(&snapshot(10.0, 20.0, 30.0, 25.0), &Thresholds::default());
        assert_eq!(
            rec,
            Recommendation::ScaleDown {
                reason: "Low resource utilization: CPU=10.0%, Connections=20, IOPS=30, Memory=25.0%"
                    .to_string()
            }
        );
    }

    #[test]
    fn one_metric_in_dead_zone_blocks_scale_down() {
        // Memory sits between low (40) and high (85).
        let rec = evaluate(&snapshot(10.0, 20.0, 30.0, 60.0), &Thresholds::default());
        assert_eq!(rec, Recommendation::NoChange);
        assert_eq!(rec.action(), None);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = Thresholds::default();
        assert!(matches!(
            evaluate(&snapshot(80.0, 0.0, 0.0, 0.0), &t),
            Recommendation::ScaleUp { .. }
        ));
        assert!(matches!(
            evaluate(&snapshot(30.0, 100.0, 100.0, 40.0), &t),
            Recommendation::ScaleDown { .. }
        ));
    }

    #[test]
    fn zero_width_dead_zone_prefers_scale_up() {
        let t = Thresholds {
            cpu: MetricThreshold::new(50.0, 50.0),
            ..Thresholds::default()
        };
        let rec = evaluate(&snapshot(50.0, 0.0, 0.0, 0.0), &t);
        assert!(matches!(rec, Recommendation::ScaleUp { .. }));
    }

    #[test]
    fn health_and_alerts() {
        let t = Thresholds::default();
        let hot = snapshot(95.0, 1200.0, 10.0, 10.0);
        assert!(!is_healthy(&hot, &t));
        assert_eq!(
            alert_conditions(&hot, &t),
            vec![
                "High CPU utilization: 95.0%".to_string(),
                "High connection count: 1200".to_string(),
            ]
        );

        // Exactly at high is still healthy but does raise an alert.
        let edge = snapshot(80.0, 0.0, 0.0, 0.0);
        assert!(is_healthy(&edge, &t));
        assert_eq!(alert_conditions(&edge, &t).len(), 1);
    }

    fn threshold() -> impl Strategy<Value = MetricThreshold> {
        (0.0..1000.0f64, 0.001..500.0f64).prop_map(|(low, gap)| MetricThreshold::new(low + gap, low))
    }

    proptest! {
        #[test]
        fn scale_up_and_scale_down_are_exclusive(
            cpu in threshold(),
            connections in threshold(),
            iops in threshold(),
            memory in threshold(),
            values in proptest::array::uniform4(0.0..2000.0f64),
        ) {
            let t = Thresholds { cpu, connections, iops, memory };
            let snap = snapshot(values[0], values[1], values[2], values[3]);

            let any_high = Metric::ALL.iter().any(|m| snap.value(*m) >= t.get(*m).high);
            let all_low = Metric::ALL.iter().all(|m| snap.value(*m) <= t.get(*m).low);
            prop_assert!(!(any_high && all_low));

            let rec = evaluate(&snap, &t);
            match rec {
                Recommendation::ScaleUp { .. } => prop_assert!(any_high),
                Recommendation::ScaleDown { .. } => prop_assert!(all_low),
                Recommendation::NoChange => prop_assert!(!any_high && !all_low),
            }
        }

        #[test]
        fn any_metric_inside_dead_zone_never_scales_down(
            low in 0.0..100.0f64,
            gap in 1.0..100.0f64,
            offset in 0.01..0.99f64,
            which in 0usize..4,
        ) {
            let mt = MetricThreshold::new(low + gap, low);
            let t = Thresholds { cpu: mt, connections: mt, iops: mt, memory: mt };
            let mut values = [low; 4];
            values[which] = low + gap * offset;
            let snap = snapshot(values[0], values[1], values[2], values[3]);

            prop_assert_eq!(evaluate(&snap, &t), Recommendation::NoChange);
        }
    }
}
