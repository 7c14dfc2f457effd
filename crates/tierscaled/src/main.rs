//! tierscaled: the tierscale daemon.
//!
//! Runs the autoscaling control loop over a fleet of database clusters
//! and exposes one-shot commands for ticks, status and manual overrides.
//!
//! # Usage
//!
//! ```text
//! tierscaled init-config --clusters orders,billing
//! tierscaled run --listen 127.0.0.1:8480
//! tierscaled force-scale orders M30 --reason "planned migration"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tierscale_core::{Size, TierscaleConfig};
use tierscaled::app;
use tierscaled::fleet::{FleetFile, FleetState};

#[derive(Parser)]
#[command(name = "tierscaled", about = "tierscale autoscaling daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "tierscale.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter config and fleet file.
    InitConfig {
        /// Clusters to manage.
        #[arg(long, value_delimiter = ',', default_value = "cluster-0")]
        clusters: Vec<String>,

        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Run a single pass over the clusters and print the results.
    Tick {
        /// Clusters to process (defaults to the configured list).
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,
    },

    /// Run the control loop until Ctrl-C.
    Run {
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,

        /// Serve the REST API on this address.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Collect current metrics and print a status report.
    Status {
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,
    },

    /// Resize a cluster to a specific tier, bypassing thresholds and rate limits.
    ForceScale {
        cluster: String,
        size: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Enable or disable automatic scaling for a cluster (persisted in the config).
    ToggleScaling {
        cluster: String,

        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::InitConfig { clusters, force } => init_config(&cli.config, &clusters, force).await,
        Command::Tick { clusters } => tick(&cli.config, &clusters).await,
        Command::Run { clusters, listen } => run(&cli.config, &clusters, listen).await,
        Command::Status { clusters } => status(&cli.config, &clusters).await,
        Command::ForceScale {
            cluster,
            size,
            reason,
        } => force_scale(&cli.config, &cluster, Size::new(size), reason.as_deref()).await,
        Command::ToggleScaling { cluster, enabled } => {
            toggle_scaling(&cli.config, &cluster, enabled)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tierscaled=debug,tierscale=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<TierscaleConfig> {
    TierscaleConfig::load_or_default(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn orchestrator(
    config_path: &Path,
    config: &TierscaleConfig,
) -> anyhow::Result<tierscale_autoscale::Orchestrator> {
    let fleet_path = app::fleet_path(config_path, config);
    Ok(app::build_orchestrator(config, fleet_path)?)
}

async fn init_config(path: &Path, clusters: &[String], force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let ids: Vec<&str> = clusters.iter().map(String::as_str).collect();
    let config = TierscaleConfig::scaffold(&ids);
    config.write_to(path)?;
    info!(path = %path.display(), "config written");

    let fleet = FleetFile::new(app::fleet_path(path, &config));
    if fleet.path().exists() {
        info!(path = %fleet.path().display(), "fleet file exists, leaving it alone");
    } else {
        fleet.store(&FleetState::sample(&ids)).await?;
        info!(path = %fleet.path().display(), "sample fleet file written");
    }
    Ok(())
}

async fn tick(config_path: &Path, requested: &[String]) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let clusters = app::select_clusters(requested, &config);
    if clusters.is_empty() {
        bail!("no clusters configured or requested");
    }

    let orchestrator = orchestrator(config_path, &config)?;
    let results = orchestrator.run_tick(&clusters).await;
    print_json(&results)
}

async fn run(
    config_path: &Path,
    requested: &[String],
    listen: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let clusters = app::select_clusters(requested, &config);
    if clusters.is_empty() {
        bail!("no clusters configured or requested");
    }

    let orchestrator = Arc::new(orchestrator(config_path, &config)?);
    info!(clusters = ?clusters, "tierscale daemon starting");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = {
        let orchestrator = orchestrator.clone();
        let interval = config.monitoring.check_interval;
        tokio::spawn(async move { orchestrator.run(clusters, interval, shutdown_rx).await })
    };

    // ── API server / wait for Ctrl-C ───────────────────────────

    match listen {
        Some(addr) => {
            let router = tierscale_api::build_router(orchestrator.clone());
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(%addr, "API server starting");

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    wait_for_ctrl_c().await;
                    let _ = shutdown_tx.send(true);
                })
                .await?;
        }
        None => {
            wait_for_ctrl_c().await;
            let _ = shutdown_tx.send(true);
        }
    }

    // The in-flight tick finishes before the loop exits.
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "control loop task ended abnormally");
    }

    info!("tierscale daemon stopped");
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
    }
    info!("shutdown signal received");
}

async fn status(config_path: &Path, requested: &[String]) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let clusters = app::select_clusters(requested, &config);

    let orchestrator = orchestrator(config_path, &config)?;
    orchestrator.observe(&clusters).await;
    let report = orchestrator.report(&clusters).await;
    info!(
        clusters = report.clusters.len(),
        healthy = report.healthy_count(),
        "status collected"
    );
    print_json(&report)
}

async fn force_scale(
    config_path: &Path,
    cluster: &str,
    size: Size,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = orchestrator(config_path, &config)?;

    let result = orchestrator
        .force_scale(cluster, &size, reason)
        .await
        .with_context(|| format!("force-scaling {cluster} to {size}"))?;
    print_json(&result)
}

fn toggle_scaling(config_path: &Path, cluster: &str, enabled: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if config.set_cluster_scaling(cluster, enabled) {
        config.write_to(config_path)?;
        info!(cluster, enabled, path = %config_path.display(), "scaling setting saved");
    } else {
        info!(cluster, enabled, "scaling setting unchanged");
    }
    Ok(())
}
