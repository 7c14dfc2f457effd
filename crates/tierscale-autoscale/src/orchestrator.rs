//! Scaling orchestrator: the per-cluster control loop.
//!
//! Each cluster owns an arena slot: an in-flight guard plus its
//! [`ClusterLedger`]. A tick that finds the guard held skips the cluster;
//! a manual force-scale waits for it. Automatic and manual resizes share
//! one execution path, so event recording and alerting never diverge.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use tierscale_core::{
    ClusterId, ConfigResult, Direction, LadderError, ScalingAction, ScalingEvent, ScalingOutcome,
    Size, SizeLadder, Snapshot, Thresholds, TierscaleConfig,
};
use tierscale_metrics::{MetricsAggregator, MetricsHistory, MetricsSource};
use tierscale_notify::{AlertDispatcher, Notification};

use crate::error::{ScaleError, ScaleResult};
use crate::evaluator::{self, Recommendation};
use crate::events::ClusterLedger;
use crate::executor::{ResizeExecutor, ResizeOutcome};
use crate::limiter::{Admission, RateLimiter};
use crate::status::{ClusterStatus, StatusReport};

/// How one cluster's pass through the pipeline ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// A previous pass for this cluster is still running.
    Busy,
    CollectionFailed {
        error: String,
    },
    /// No scaling recommended.
    Steady,
    ScalingDisabled {
        recommendation: Recommendation,
    },
    RateLimited {
        recommendation: Recommendation,
        admission: Admission,
    },
    SizeLookupFailed {
        error: String,
    },
    /// The reported size is not on the ladder.
    UnknownSize {
        size: Size,
    },
    /// Already at the edge of the ladder in the recommended direction.
    AtBoundary {
        size: Size,
        recommendation: Recommendation,
    },
    Scaled {
        event: ScalingEvent,
    },
    Failed {
        event: ScalingEvent,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub cluster_id: ClusterId,
    #[serde(flatten)]
    pub outcome: TickOutcome,
}

/// Successful result of a manual resize.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ForceScaleResult {
    /// Already at the requested size; the executor was not called.
    Unchanged { size: Size },
    Scaled { event: ScalingEvent },
}

struct ClusterSlot {
    in_flight: Mutex<()>,
    ledger: RwLock<ClusterLedger>,
}

impl ClusterSlot {
    fn new(scaling_enabled: bool) -> Self {
        Self {
            in_flight: Mutex::new(()),
            ledger: RwLock::new(ClusterLedger::new(scaling_enabled)),
        }
    }
}

/// Where a recorded event's timestamp comes from.
#[derive(Debug, Clone, Copy)]
enum EventClock {
    /// Wall-clock time once the resize call returns.
    Wall,
    Fixed(DateTime<Utc>),
}

impl EventClock {
    fn now(self) -> DateTime<Utc> {
        match self {
            EventClock::Wall => Utc::now(),
            EventClock::Fixed(at) => at,
        }
    }
}

pub struct Orchestrator {
    clusters: Vec<ClusterId>,
    aggregator: MetricsAggregator,
    executor: Arc<dyn ResizeExecutor>,
    dispatcher: AlertDispatcher,
    thresholds: Thresholds,
    ladder: SizeLadder,
    limiter: RateLimiter,
    resize_timeout: Duration,
    max_concurrency: usize,
    /// Seeds the enabled flag of slots created after startup.
    scaling_enabled: bool,
    disabled_clusters: HashSet<ClusterId>,
    history: RwLock<MetricsHistory>,
    slots: RwLock<HashMap<ClusterId, Arc<ClusterSlot>>>,
}

impl Orchestrator {
    pub fn new(
        config: &TierscaleConfig,
        source: Arc<dyn MetricsSource>,
        executor: Arc<dyn ResizeExecutor>,
        dispatcher: AlertDispatcher,
    ) -> ConfigResult<Self> {
        let ladder = config.size_ladder()?;
        let slots = config
            .clusters
            .iter()
            .map(|id| {
                let slot = ClusterSlot::new(config.scaling_enabled_for(id));
                (id.clone(), Arc::new(slot))
            })
            .collect();

        Ok(Self {
            clusters: config.clusters.clone(),
            aggregator: MetricsAggregator::new(
                source,
                config.monitoring.lookback_window,
                config.timeouts.metrics,
            ),
            executor,
            dispatcher,
            thresholds: config.thresholds.clone(),
            ladder,
            limiter: RateLimiter::from_config(&config.scaling),
            resize_timeout: config.timeouts.resize,
            max_concurrency: config.monitoring.max_concurrency.max(1),
            scaling_enabled: config.scaling.enabled,
            disabled_clusters: config.scaling.disabled_clusters.iter().cloned().collect(),
            history: RwLock::new(MetricsHistory::new(config.monitoring.history_capacity)),
            slots: RwLock::new(slots),
        })
    }

    /// Clusters named in the configuration.
    pub fn clusters(&self) -> &[ClusterId] {
        &self.clusters
    }

    /// Run one pass for every cluster, at most `max_concurrency` at a time.
    ///
    /// Results come back in the order of `cluster_ids`.
    pub async fn run_tick(&self, cluster_ids: &[ClusterId]) -> Vec<ProcessResult> {
        let results: Vec<ProcessResult> = stream::iter(cluster_ids.iter().cloned())
            .map(|id| async move { self.process(&id).await })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let scaled = results
            .iter()
            .filter(|r| matches!(r.outcome, TickOutcome::Scaled { .. }))
            .count();
        debug!(clusters = results.len(), scaled, "tick complete");
        results
    }

    /// Tick every `interval` until `shutdown` changes.
    ///
    /// Shutdown is only observed between ticks.
    pub async fn run(
        &self,
        cluster_ids: Vec<ClusterId>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            clusters = cluster_ids.len(),
            "autoscaler started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick(&cluster_ids).await;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }

    /// One pass for `cluster_id`. Events are stamped when the resize returns.
    pub async fn process(&self, cluster_id: &str) -> ProcessResult {
        self.process_with(cluster_id, Utc::now(), EventClock::Wall).await
    }

    /// One pass for `cluster_id`, treating `now` as the current time for
    /// evaluation, rate limiting and event timestamps.
    pub async fn process_at(&self, cluster_id: &str, now: DateTime<Utc>) -> ProcessResult {
        self.process_with(cluster_id, now, EventClock::Fixed(now)).await
    }

    async fn process_with(
        &self,
        cluster_id: &str,
        now: DateTime<Utc>,
        clock: EventClock,
    ) -> ProcessResult {
        let slot = self.slot(cluster_id).await;
        let outcome = match slot.in_flight.try_lock() {
            Ok(_guard) => self.run_pipeline(cluster_id, &slot, now, clock).await,
            Err(_) => {
                debug!(cluster = %cluster_id, "previous pass still in flight, skipping");
                TickOutcome::Busy
            }
        };
        ProcessResult {
            cluster_id: cluster_id.to_string(),
            outcome,
        }
    }

    async fn run_pipeline(
        &self,
        cluster_id: &str,
        slot: &ClusterSlot,
        now: DateTime<Utc>,
        clock: EventClock,
    ) -> TickOutcome {
        let snapshot = match self.aggregator.collect(cluster_id, now).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(cluster = %cluster_id, error = %e, "metrics collection failed, skipping this tick");
                return TickOutcome::CollectionFailed {
                    error: e.to_string(),
                };
            }
        };
        self.history.write().await.push(snapshot.clone());

        let alerts = evaluator::alert_conditions(&snapshot, &self.thresholds);
        if !alerts.is_empty() {
            self.dispatcher
                .dispatch(&Notification::alert(cluster_id, alerts, now))
                .await;
        }

        let recommendation = evaluator::evaluate(&snapshot, &self.thresholds);
        let (Some(direction), Some(action)) = (recommendation.direction(), recommendation.action())
        else {
            debug!(
                cluster = %cluster_id,
                cpu = snapshot.cpu_pct,
                connections = snapshot.connections,
                iops = snapshot.iops,
                memory = snapshot.memory_pct,
                "within thresholds"
            );
            return TickOutcome::Steady;
        };

        {
            let ledger = slot.ledger.read().await;
            if !ledger.scaling_enabled {
                info!(cluster = %cluster_id, %action, "scaling disabled, recommendation not acted on");
                return TickOutcome::ScalingDisabled { recommendation };
            }
            let admission = self.limiter.check(&ledger, &recommendation, now);
            if !admission.is_admitted() {
                info!(cluster = %cluster_id, %action, ?admission, "recommendation suppressed by rate limiter");
                return TickOutcome::RateLimited {
                    recommendation,
                    admission,
                };
            }
        }

        let current = match self.current_size(cluster_id).await {
            Ok(size) => size,
            Err(e) => {
                warn!(cluster = %cluster_id, error = %e, "cannot read current size");
                return TickOutcome::SizeLookupFailed {
                    error: e.to_string(),
                };
            }
        };

        let target = match self.ladder.next(&current, direction) {
            Ok(Some(target)) => target,
            Ok(None) => {
                let bound = match direction {
                    Direction::Up => self.ladder.ceiling(),
                    Direction::Down => self.ladder.floor(),
                };
                warn!(cluster = %cluster_id, size = %current, %bound, %action, "already at ladder boundary");
                return TickOutcome::AtBoundary {
                    size: current,
                    recommendation,
                };
            }
            Err(e) => {
                warn!(cluster = %cluster_id, error = %e, "abandoning scaling attempt");
                return TickOutcome::UnknownSize { size: current };
            }
        };

        let reason = recommendation.reason().unwrap_or_default().to_string();
        let event = self
            .execute(cluster_id, slot, current, target, action, reason, clock)
            .await;

        if event.succeeded() {
            TickOutcome::Scaled { event }
        } else {
            TickOutcome::Failed { event }
        }
    }

    /// Manual resize to `target`, bypassing evaluation and rate limits.
    ///
    /// Waits for any in-flight pass on the same cluster.
    pub async fn force_scale(
        &self,
        cluster_id: &str,
        target: &Size,
        reason: Option<&str>,
    ) -> ScaleResult<ForceScaleResult> {
        if !self.ladder.contains(target) {
            return Err(LadderError::UnknownSize(target.clone()).into());
        }

        let slot = self.slot(cluster_id).await;
        let _guard = slot.in_flight.lock().await;

        let current = self.current_size(cluster_id).await?;
        if current == *target {
            info!(cluster = %cluster_id, size = %current, "already at requested size");
            return Ok(ForceScaleResult::Unchanged { size: current });
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Manual scaling")
            .to_string();

        let event = self
            .execute(
                cluster_id,
                &slot,
                current,
                target.clone(),
                ScalingAction::Manual,
                reason,
                EventClock::Wall,
            )
            .await;

        match &event.outcome {
            ScalingOutcome::Success => Ok(ForceScaleResult::Scaled { event }),
            ScalingOutcome::Failure { error } => Err(ScaleError::Execution {
                cluster: cluster_id.to_string(),
                reason: error.clone(),
            }),
        }
    }

    /// Enable or disable automatic scaling for one cluster; returns the
    /// previous setting.
    pub async fn set_scaling_enabled(&self, cluster_id: &str, enabled: bool) -> bool {
        let slot = self.slot(cluster_id).await;
        let mut ledger = slot.ledger.write().await;
        let previous = std::mem::replace(&mut ledger.scaling_enabled, enabled);
        info!(cluster = %cluster_id, enabled, previous, "scaling toggled");
        previous
    }

    pub async fn is_scaling_enabled(&self, cluster_id: &str) -> bool {
        match self.slots.read().await.get(cluster_id) {
            Some(slot) => slot.ledger.read().await.scaling_enabled,
            None => self.seed_enabled(cluster_id),
        }
    }

    /// Collect and record snapshots without evaluating or scaling.
    ///
    /// Returns how many clusters were collected.
    pub async fn observe(&self, cluster_ids: &[ClusterId]) -> usize {
        let now = Utc::now();
        let snapshots: Vec<Option<Snapshot>> = stream::iter(cluster_ids)
            .map(|id| async move {
                match self.aggregator.collect(id, now).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!(cluster = %id, error = %e, "metrics collection failed");
                        None
                    }
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut history = self.history.write().await;
        let mut collected = 0;
        for snapshot in snapshots.into_iter().flatten() {
            history.push(snapshot);
            collected += 1;
        }
        collected
    }

    pub async fn latest_snapshot(&self, cluster_id: &str) -> Option<Snapshot> {
        self.history.read().await.latest_for(cluster_id).cloned()
    }

    /// All retained scaling events for a cluster, oldest first.
    pub async fn events(&self, cluster_id: &str) -> Vec<ScalingEvent> {
        match self.slots.read().await.get(cluster_id) {
            Some(slot) => slot.ledger.read().await.events.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Status for each of `cluster_ids`. Read-only.
    pub async fn report(&self, cluster_ids: &[ClusterId]) -> StatusReport {
        let now = Utc::now();
        let history = self.history.read().await;
        let slots = self.slots.read().await;

        let mut clusters = BTreeMap::new();
        for id in cluster_ids {
            let latest = history.latest_for(id);
            let status = match slots.get(id) {
                Some(slot) => {
                    let ledger = slot.ledger.read().await;
                    ClusterStatus::build(latest, &ledger, &self.thresholds, now)
                }
                None => {
                    let ledger = ClusterLedger::new(self.seed_enabled(id));
                    ClusterStatus::build(latest, &ledger, &self.thresholds, now)
                }
            };
            clusters.insert(id.clone(), status);
        }

        StatusReport {
            generated_at: now,
            clusters,
        }
    }

    /// Resize and record the attempt. Caller holds the cluster's guard.
    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        cluster_id: &str,
        slot: &ClusterSlot,
        from: Size,
        to: Size,
        action: ScalingAction,
        reason: String,
        clock: EventClock,
    ) -> ScalingEvent {
        info!(cluster = %cluster_id, %action, from = %from, to = %to, reason = %reason, "resizing cluster");

        let outcome =
            match tokio::time::timeout(self.resize_timeout, self.executor.resize(cluster_id, &to))
                .await
            {
                Ok(Ok(ResizeOutcome::Accepted)) => ScalingOutcome::Success,
                Ok(Ok(ResizeOutcome::Rejected(message))) => ScalingOutcome::Failure {
                    error: format!("rejected: {message}"),
                },
                Ok(Err(e)) => ScalingOutcome::Failure {
                    error: e.to_string(),
                },
                Err(_) => ScalingOutcome::Failure {
                    error: format!("resize timed out after {:?}", self.resize_timeout),
                },
            };

        let event = ScalingEvent {
            cluster_id: cluster_id.to_string(),
            timestamp: clock.now(),
            action,
            from_size: from,
            to_size: to,
            reason,
            outcome,
        };
        slot.ledger.write().await.record(event.clone());

        match &event.outcome {
            ScalingOutcome::Success => {
                info!(
                    cluster = %cluster_id,
                    %action,
                    from = %event.from_size,
                    to = %event.to_size,
                    "cluster resized"
                );
                self.dispatcher
                    .dispatch(&Notification::scaling(&event))
                    .await;
            }
            ScalingOutcome::Failure { error } => {
                error!(
                    cluster = %cluster_id,
                    %action,
                    from = %event.from_size,
                    to = %event.to_size,
                    error = %error,
                    "resize failed"
                );
            }
        }

        event
    }

    async fn current_size(&self, cluster_id: &str) -> ScaleResult<Size> {
        match tokio::time::timeout(self.resize_timeout, self.executor.get_current_size(cluster_id))
            .await
        {
            Ok(Ok(size)) => Ok(size),
            Ok(Err(source)) => Err(ScaleError::SizeLookup {
                cluster: cluster_id.to_string(),
                source,
            }),
            Err(_) => Err(ScaleError::Timeout {
                cluster: cluster_id.to_string(),
                operation: "size lookup",
                timeout: self.resize_timeout,
            }),
        }
    }

    fn seed_enabled(&self, cluster_id: &str) -> bool {
        self.scaling_enabled && !self.disabled_clusters.contains(cluster_id)
    }

    async fn slot(&self, cluster_id: &str) -> Arc<ClusterSlot> {
        if let Some(slot) = self.slots.read().await.get(cluster_id) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(cluster_id.to_string())
            .or_insert_with(|| Arc::new(ClusterSlot::new(self.seed_enabled(cluster_id))))
            .clone()
    }
}
