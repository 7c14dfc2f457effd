//! Assembles an [`Orchestrator`] from a loaded configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use tierscale_autoscale::Orchestrator;
use tierscale_core::{ClusterId, ConfigResult, TierscaleConfig};
use tierscale_notify::AlertDispatcher;

use crate::fleet::FleetFile;

/// Resolve the fleet file relative to the directory holding the config.
pub fn fleet_path(config_path: &Path, config: &TierscaleConfig) -> PathBuf {
    let fleet = &config.backend.fleet_file;
    if fleet.is_absolute() {
        return fleet.clone();
    }
    match config_path.parent() {
        Some(dir) => dir.join(fleet),
        None => fleet.clone(),
    }
}

/// Build the orchestrator with the file-backed fleet and configured alerts.
pub fn build_orchestrator(config: &TierscaleConfig, fleet_path: PathBuf) -> ConfigResult<Orchestrator> {
    let fleet = Arc::new(FleetFile::new(fleet_path));
    let dispatcher = AlertDispatcher::from_config(&config.alerts, config.timeouts.notify);

    info!(
        fleet = ?fleet.path(),
        clusters = config.clusters.len(),
        alert_channels = dispatcher.channel_count(),
        "orchestrator initialized"
    );

    Orchestrator::new(config, fleet.clone(), fleet, dispatcher)
}

/// Clusters named on the command line, or the configured ones.
pub fn select_clusters(requested: &[String], config: &TierscaleConfig) -> Vec<ClusterId> {
    if requested.is_empty() {
        config.clusters.clone()
    } else {
        requested.to_vec()
    }
}
