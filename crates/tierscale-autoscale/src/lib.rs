//! tierscale-autoscale: the per-cluster scaling decision engine.
//!
//! One pass per cluster per tick:
//!
//! ```text
//! MetricsAggregator → Snapshot
//!   → evaluate()            Recommendation (OR up / AND down)
//!   → RateLimiter           cooldown + hourly quota
//!   → ResizeExecutor        authoritative size, then resize
//!   → ClusterLedger         ScalingEvent + CooldownState
//!   → AlertDispatcher       best-effort notifications
//! ```
//!
//! Per-cluster state lives in an arena slot owned by the [`Orchestrator`];
//! clusters never share mutable state.

pub mod error;
pub mod evaluator;
pub mod events;
pub mod executor;
pub mod limiter;
pub mod orchestrator;
pub mod status;

pub use error::ScaleError;
pub use evaluator::{Recommendation, alert_conditions, evaluate, is_healthy};
pub use events::{ClusterLedger, CooldownState, ScalingEventLog};
pub use executor::{ExecutorError, ResizeExecutor, ResizeOutcome};
pub use limiter::{Admission, RateLimiter};
pub use orchestrator::{ForceScaleResult, Orchestrator, ProcessResult, TickOutcome};
pub use status::{ClusterStatus, StatusReport};
