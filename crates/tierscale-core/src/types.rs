//! Domain types shared across tierscale crates.
//!
//! Snapshots and thresholds describe what the control loop sees on a
//! tick; scaling events are the append-only record of what it did.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a managed cluster.
pub type ClusterId = String;

// ── Sizes ──────────────────────────────────────────────────────────

/// A named capacity tier, e.g. `M30`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(String);

impl Size {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Size {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Size {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// The utilization dimensions the autoscaler watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Connections,
    Iops,
    Memory,
}

impl Metric {
    /// Every metric, in reporting order.
    pub const ALL: [Metric; 4] = [Metric::Cpu, Metric::Connections, Metric::Iops, Metric::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Connections => "connections",
            Metric::Iops => "iops",
            Metric::Memory => "memory",
        }
    }

    /// Human-readable label used in reasons and alerts.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::Connections => "connections",
            Metric::Iops => "IOPS",
            Metric::Memory => "memory",
        }
    }

    /// Render a reading of this metric: percentages keep one decimal,
    /// counts are whole numbers.
    pub fn format_value(&self, value: f64) -> String {
        match self {
            Metric::Cpu | Metric::Memory => format!("{value:.1}%"),
            Metric::Connections | Metric::Iops => format!("{value:.0}"),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregated multi-metric reading for a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cluster_id: ClusterId,
    pub captured_at: DateTime<Utc>,
    /// Mean CPU utilization over the look-back window (0–100).
    pub cpu_pct: f64,
    /// Mean open connection count.
    pub connections: f64,
    /// Mean disk IOPS.
    pub iops: f64,
    /// Mean memory utilization (0–100).
    pub memory_pct: f64,
}

impl Snapshot {
    /// Value of a single metric.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_pct,
            Metric::Connections => self.connections,
            Metric::Iops => self.iops,
            Metric::Memory => self.memory_pct,
        }
    }
}

// ── Thresholds ─────────────────────────────────────────────────────

/// High/low pair for one metric. The range between them is the dead zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub high: f64,
    pub low: f64,
}

impl MetricThreshold {
    pub const fn new(high: f64, low: f64) -> Self {
        Self { high, low }
    }
}

/// Thresholds for every watched metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu: MetricThreshold,
    pub connections: MetricThreshold,
    pub iops: MetricThreshold,
    pub memory: MetricThreshold,
}

impl Thresholds {
    pub fn get(&self, metric: Metric) -> MetricThreshold {
        match metric {
            Metric::Cpu => self.cpu,
            Metric::Connections => self.connections,
            Metric::Iops => self.iops,
            Metric::Memory => self.memory,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: MetricThreshold::new(80.0, 30.0),
            connections: MetricThreshold::new(1000.0, 100.0),
            iops: MetricThreshold::new(1000.0, 100.0),
            memory: MetricThreshold::new(85.0, 40.0),
        }
    }
}

// ── Scaling events ─────────────────────────────────────────────────

/// Kind of scaling action. Cooldowns and quotas are tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    /// Operator-initiated force-scale. Never rate limited.
    Manual,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingAction::ScaleUp => "scale_up",
            ScalingAction::ScaleDown => "scale_down",
            ScalingAction::Manual => "manual",
        }
    }
}

impl fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an attempted resize ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScalingOutcome {
    Success,
    Failure { error: String },
}

/// Append-only record of one attempted resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub cluster_id: ClusterId,
    pub timestamp: DateTime<Utc>,
    pub action: ScalingAction,
    pub from_size: Size,
    pub to_size: Size,
    pub reason: String,
    pub outcome: ScalingOutcome,
}

impl ScalingEvent {
    pub fn succeeded(&self) -> bool {
        self.outcome == ScalingOutcome::Success
    }
}
