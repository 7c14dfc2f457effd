//! tierscale-metrics: turns raw utilization samples into snapshots.
//!
//! # Architecture
//!
//! ```text
//! MetricsAggregator
//!   ├── MetricsSource::get_samples() ← one call per metric, concurrently
//!   └── collect() → Snapshot (arithmetic mean per metric)
//!
//! MetricsHistory
//!   └── bounded ring buffer of recent snapshots, for status reporting
//! ```
//!
//! A metric with no samples in the window reads as `0`; a failing or
//! hung source fails the whole collection for that cluster and tick.

pub mod aggregator;
pub mod history;
pub mod source;

pub use aggregator::{CollectionError, MetricsAggregator};
pub use history::MetricsHistory;
pub use source::{MetricsSource, Sample, SourceError, TimeWindow};
