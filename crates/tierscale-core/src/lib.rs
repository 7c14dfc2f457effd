//! tierscale-core: shared types for the tierscale autoscaler.
//!
//! Holds the pieces every other crate agrees on: metric snapshots,
//! thresholds, scaling events, the ordered size ladder, and the
//! `tierscale.toml` configuration with its load-time validation.

pub mod config;
pub mod error;
pub mod ladder;
pub mod types;

pub use config::TierscaleConfig;
pub use error::{ConfigError, ConfigResult};
pub use ladder::{Direction, LadderError, SizeLadder};
pub use types::*;
