//! tierscale.toml configuration parser.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. Validation runs once at load time; downstream
//! crates receive typed values and never re-check them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::ladder::{DEFAULT_TIERS, SizeLadder};
use crate::types::{Metric, Size, Thresholds};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierscaleConfig {
    /// Clusters managed when none are named on the command line.
    pub clusters: Vec<String>,
    pub monitoring: MonitoringConfig,
    pub thresholds: Thresholds,
    pub scaling: ScalingConfig,
    pub ladder: LadderConfig,
    pub alerts: AlertConfig,
    pub timeouts: TimeoutConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Time between control loop ticks.
    #[serde(with = "duration_str")]
    pub check_interval: Duration,
    /// How far back each tick averages samples.
    #[serde(with = "duration_str")]
    pub lookback_window: Duration,
    /// Snapshots kept for status reporting, across all clusters.
    pub history_capacity: usize,
    /// Clusters processed concurrently within one tick.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,
    #[serde(with = "duration_str")]
    pub scale_up_cooldown: Duration,
    #[serde(with = "duration_str")]
    pub scale_down_cooldown: Duration,
    pub max_scale_up_per_hour: u32,
    pub max_scale_down_per_hour: u32,
    /// Smallest size automatic scale-down may reach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Size>,
    /// Largest size automatic scale-up may reach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<Size>,
    /// Clusters whose automatic scaling is switched off.
    pub disabled_clusters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Tier names, smallest first.
    pub tiers: Vec<Size>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Generic JSON webhook receiving every notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Slack incoming-webhook URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

/// Upper bounds on each blocking call to an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "duration_str")]
    pub metrics: Duration,
    #[serde(with = "duration_str")]
    pub resize: Duration,
    #[serde(with = "duration_str")]
    pub notify: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// JSON file describing cluster sizes and metric samples.
    pub fleet_file: PathBuf,
}

impl Default for TierscaleConfig {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            monitoring: MonitoringConfig::default(),
            thresholds: Thresholds::default(),
            scaling: ScalingConfig::default(),
            ladder: LadderConfig::default(),
            alerts: AlertConfig::default(),
            timeouts: TimeoutConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            lookback_window: Duration::from_secs(5 * 60),
            history_capacity: 100,
            max_concurrency: 4,
        }
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale_up_cooldown: Duration::ZERO,
            scale_down_cooldown: Duration::from_secs(5 * 60),
            max_scale_up_per_hour: 3,
            max_scale_down_per_hour: 2,
            min_size: Some(Size::from("M10")),
            max_size: Some(Size::from("M80")),
            disabled_clusters: Vec::new(),
        }
    }
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.iter().map(|t| Size::from(*t)).collect(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            slack_webhook: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metrics: Duration::from_secs(10),
            resize: Duration::from_secs(30),
            notify: Duration::from_secs(10),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fleet_file: PathBuf::from("fleet.json"),
        }
    }
}

impl TierscaleConfig {
    /// Read and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Like `from_file`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            return Self::from_file(path);
        }
        debug!(path = ?path, "config file not found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TierscaleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML with a short comment above each section.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        let body = toml::to_string_pretty(self)?;
        Ok(annotate(&body))
    }

    pub fn write_to(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Scaffold a config managing the given clusters.
    pub fn scaffold(clusters: &[&str]) -> Self {
        TierscaleConfig {
            clusters: clusters.iter().map(|c| c.to_string()).collect(),
            alerts: AlertConfig {
                enabled: true,
                webhook_url: Some("http://localhost:9000/tierscale".to_string()),
                slack_webhook: None,
            },
            ..Default::default()
        }
    }

    /// Check every invariant the control loop relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_thresholds(&self.thresholds)?;
        self.size_ladder()?;

        if self.monitoring.check_interval.is_zero() {
            return Err(invalid("monitoring.check_interval", "must be greater than zero"));
        }
        if self.monitoring.lookback_window.is_zero() {
            return Err(invalid("monitoring.lookback_window", "must be greater than zero"));
        }
        if self.monitoring.history_capacity == 0 {
            return Err(invalid("monitoring.history_capacity", "must be at least 1"));
        }
        if self.monitoring.max_concurrency == 0 {
            return Err(invalid("monitoring.max_concurrency", "must be at least 1"));
        }
        Ok(())
    }

    /// The configured ladder, bounded by `scaling.min_size`/`max_size`.
    pub fn size_ladder(&self) -> ConfigResult<SizeLadder> {
        let ladder = SizeLadder::new(self.ladder.tiers.clone())?
            .with_bounds(self.scaling.min_size.as_ref(), self.scaling.max_size.as_ref())?;
        Ok(ladder)
    }

    /// Whether automatic scaling starts enabled for `cluster`.
    pub fn scaling_enabled_for(&self, cluster: &str) -> bool {
        self.scaling.enabled && !self.scaling.disabled_clusters.iter().any(|c| c == cluster)
    }

    /// Add or remove `cluster` from the disabled list. Returns whether
    /// anything changed.
    pub fn set_cluster_scaling(&mut self, cluster: &str, enabled: bool) -> bool {
        let disabled = &mut self.scaling.disabled_clusters;
        let present = disabled.iter().any(|c| c == cluster);
        match (enabled, present) {
            (true, true) => {
                disabled.retain(|c| c != cluster);
                true
            }
            (false, false) => {
                disabled.push(cluster.to_string());
                true
            }
            _ => false,
        }
    }
}

/// Reject inverted or non-finite thresholds. `low == high` is allowed and
/// behaves as a zero-width dead zone.
pub fn validate_thresholds(thresholds: &Thresholds) -> ConfigResult<()> {
    for metric in Metric::ALL {
        let t = thresholds.get(metric);
        if !t.high.is_finite() || !t.low.is_finite() {
            return Err(ConfigError::NonFiniteThresholds { metric });
        }
        if t.low > t.high {
            return Err(ConfigError::InvertedThresholds {
                metric,
                low: t.low,
                high: t.high,
            });
        }
        if t.low == t.high {
            warn!(%metric, value = t.high, "thresholds have no dead zone: low equals high");
        }
    }
    Ok(())
}

const HEADER: &str = "\
# tierscale configuration
#
# Durations accept \"500ms\", \"30s\", \"5m\", \"1h\" or a bare number of seconds.
# `tierscaled toggle-scaling` rewrites this file; comments other than these are not kept.
";

fn section_comment(section: &str) -> Option<&'static str> {
    let comment = match section {
        "monitoring" => "# Tick cadence, metric look-back and per-tick concurrency.",
        "thresholds" => {
            "# Scale up when any metric reaches `high`; scale down only when every metric is at or below `low`."
        }
        "scaling" => "# Cooldowns and hourly caps count successful automatic resizes only.",
        "ladder" => "# Size tiers, smallest first.",
        "alerts" => "# Notification channels. Delivery failures never block scaling.",
        "timeouts" => "# Upper bound on each metrics query, size lookup, resize and notification.",
        "backend" => "# Fleet file, relative to this config file.",
        _ => return None,
    };
    Some(comment)
}

/// Prefix the serialized config with [`HEADER`] and place a comment above
/// the first header of each section.
fn annotate(body: &str) -> String {
    let mut out = String::with_capacity(HEADER.len() + body.len() + 512);
    out.push_str(HEADER);
    out.push('\n');

    let mut commented = Vec::new();
    for line in body.lines() {
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = name.split('.').next().unwrap_or(name);
            if !commented.contains(&section) {
                commented.push(section);
                if let Some(comment) = section_comment(section) {
                    out.push_str(comment);
                    out.push('\n');
                }
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Parse a duration string like "30s", "5m", "1h" or "500ms".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| ConfigError::Duration(s.to_string()))
}

/// Inverse of [`parse_duration`], picking the largest whole unit.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() != 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Serde adapter storing `Duration` as a human duration string.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::Direction;

    #[test]
    fn empty_file_uses_defaults() {
        let config = TierscaleConfig::from_toml_str("").unwrap();
        assert_eq!(config.monitoring.check_interval, Duration::from_secs(60));
        assert_eq!(config.scaling.scale_up_cooldown, Duration::ZERO);
        assert_eq!(config.scaling.scale_down_cooldown, Duration::from_secs(300));
        assert_eq!(config.scaling.max_scale_up_per_hour, 3);
        assert_eq!(config.thresholds.cpu.high, 80.0);
        assert_eq!(config.ladder.tiers.len(), DEFAULT_TIERS.len());
    }

    #[test]
    fn parse_sections() {
        let toml_str = r#"
clusters = ["orders", "billing"]

[monitoring]
check_interval = "30s"
lookback_window = "10m"

[thresholds.cpu]
high = 90
low = 20

[scaling]
scale_down_cooldown = "15m"
max_scale_down_per_hour = 1
min_size = "M20"
disabled_clusters = ["billing"]

[timeouts]
resize = "500ms"
"#;
        let config = TierscaleConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.clusters, vec!["orders", "billing"]);
        assert_eq!(config.monitoring.check_interval, Duration::from_secs(30));
        assert_eq!(config.monitoring.lookback_window, Duration::from_secs(600));
        assert_eq!(config.thresholds.cpu.high, 90.0);
        assert_eq!(config.thresholds.cpu.low, 20.0);
        // Untouched metrics keep their defaults.
        assert_eq!(config.thresholds.memory.high, 85.0);
        assert_eq!(config.scaling.scale_down_cooldown, Duration::from_secs(900));
        assert_eq!(config.timeouts.resize, Duration::from_millis(500));
        assert!(config.scaling_enabled_for("orders"));
        assert!(!config.scaling_enabled_for("billing"));

        let ladder = config.size_ladder().unwrap();
        assert_eq!(ladder.next(&Size::from("M20"), Direction::Down).unwrap(), None);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let toml_str = r#"
[thresholds.iops]
high = 100
low = 500
"#;
        let err = TierscaleConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvertedThresholds { metric: Metric::Iops, .. }
        ));
    }

    #[test]
    fn equal_thresholds_accepted() {
        let toml_str = r#"
[thresholds.memory]
high = 60
low = 60
"#;
        assert!(TierscaleConfig::from_toml_str(toml_str).is_ok());
    }

    #[test]
    fn malformed_duration_is_an_error() {
        let toml_str = r#"
[scaling]
scale_up_cooldown = "soon"
"#;
        assert!(matches!(
            TierscaleConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn oversized_duration_is_an_error() {
        let toml_str = r#"
[scaling]
scale_down_cooldown = "307445734561825861m"
"#;
        assert!(matches!(
            TierscaleConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn min_size_must_be_on_ladder() {
        let toml_str = r#"
[scaling]
min_size = "M15"
"#;
        assert!(matches!(
            TierscaleConfig::from_toml_str(toml_str),
            Err(ConfigError::Ladder(_))
        ));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let toml_str = r#"
[monitoring]
max_concurrency = 0
"#;
        assert!(matches!(
            TierscaleConfig::from_toml_str(toml_str),
            Err(ConfigError::Invalid { field: "monitoring.max_concurrency", .. })
        ));
    }

    #[test]
    fn scaffold_round_trips() {
        let config = TierscaleConfig::scaffold(&["orders"]);
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.starts_with("# tierscale configuration"));
        assert!(toml_str.contains("orders"));
        assert!(toml_str.contains("scale_down_cooldown = \"5m\""));
        assert!(toml_str.contains(
            "# Cooldowns and hourly caps count successful automatic resizes only.\n[scaling]"
        ));
        assert_eq!(toml_str.matches("# Scale up when any metric").count(), 1);

        let parsed = TierscaleConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.clusters, vec!["orders"]);
        assert_eq!(parsed.alerts.webhook_url, config.alerts.webhook_url);
    }

    #[test]
    fn toggle_cluster_scaling() {
        let mut config = TierscaleConfig::default();
        assert!(config.set_cluster_scaling("orders", false));
        assert!(!config.set_cluster_scaling("orders", false));
        assert!(!config.scaling_enabled_for("orders"));
        assert!(config.set_cluster_scaling("orders", true));
        assert!(config.scaling_enabled_for("orders"));
    }

    #[test]
    fn write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tierscale.toml");

        let mut config = TierscaleConfig::scaffold(&["orders"]);
        config.set_cluster_scaling("orders", false);
        config.write_to(&path).unwrap();

        let reloaded = TierscaleConfig::from_file(&path).unwrap();
        assert!(!reloaded.scaling_enabled_for("orders"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TierscaleConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.clusters.is_empty());
    }

    #[test]
    fn duration_strings() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("fast").is_err());
        assert!(matches!(
            parse_duration("307445734561825861m"),
            Err(ConfigError::Duration(_))
        ));
        assert!(parse_duration("5124095576030432h").is_err());
        assert_eq!(
            parse_duration("5124095576030431h").unwrap(),
            Duration::from_secs(5124095576030431 * 3600)
        );

        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }
}
