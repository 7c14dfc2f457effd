//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::ladder::LadderError;
use crate::types::Metric;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `tierscale.toml`.
///
/// All of these are fatal at startup; nothing in the control loop
/// re-checks configuration once it has been accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration {0:?}: expected a value like \"30s\", \"5m\" or \"500ms\"")]
    Duration(String),

    #[error("invalid {metric} thresholds: low ({low}) exceeds high ({high})")]
    InvertedThresholds { metric: Metric, low: f64, high: f64 },

    #[error("invalid {metric} thresholds: bounds must be finite")]
    NonFiniteThresholds { metric: Metric },

    #[error("invalid size ladder: {0}")]
    Ladder(#[from] LadderError),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
