//! Per-cluster scaling bookkeeping: the event log and cooldown timestamps.

use chrono::{DateTime, TimeDelta, Utc};

use tierscale_core::{ScalingAction, ScalingEvent};

/// How long events are kept in memory.
pub const EVENT_RETENTION: TimeDelta = TimeDelta::hours(24);

/// Append-only log of attempted scaling actions for one cluster.
///
/// Entries older than [`EVENT_RETENTION`] relative to the newest append are
/// pruned; nothing reads further back than that.
#[derive(Debug, Clone, Default)]
pub struct ScalingEventLog {
    events: Vec<ScalingEvent>,
}

impl ScalingEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ScalingEvent) {
        let horizon = event.timestamp - EVENT_RETENTION;
        self.events.retain(|e| e.timestamp >= horizon);
        self.events.push(event);
    }

    /// Successful events of `action` with `timestamp >= since`.
    pub fn successes_since(&self, action: ScalingAction, since: DateTime<Utc>) -> usize {
        self.events
            .iter()
            .filter(|e| e.action == action && e.succeeded() && e.timestamp >= since)
            .count()
    }

    /// Events with `timestamp >= since`, oldest first.
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &ScalingEvent> {
        self.events.iter().filter(move |e| e.timestamp >= since)
    }

    /// The last `limit` events with `timestamp >= since`, oldest first.
    pub fn recent(&self, since: DateTime<Utc>, limit: usize) -> Vec<ScalingEvent> {
        let matching: Vec<&ScalingEvent> = self.since(since).collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScalingEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Time of the last *successful* automatic action of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_scale_up: Option<DateTime<Utc>>,
    pub last_scale_down: Option<DateTime<Utc>>,
}

impl CooldownState {
    pub fn last_success(&self, action: ScalingAction) -> Option<DateTime<Utc>> {
        match action {
            ScalingAction::ScaleUp => self.last_scale_up,
            ScalingAction::ScaleDown => self.last_scale_down,
            ScalingAction::Manual => None,
        }
    }

    /// Manual actions are not tracked.
    pub fn record_success(&mut self, action: ScalingAction, at: DateTime<Utc>) {
        match action {
            ScalingAction::ScaleUp => self.last_scale_up = Some(at),
            ScalingAction::ScaleDown => self.last_scale_down = Some(at),
            ScalingAction::Manual => {}
        }
    }
}

/// Everything the orchestrator remembers about one cluster.
#[derive(Debug, Clone)]
pub struct ClusterLedger {
    pub cooldowns: CooldownState,
    pub events: ScalingEventLog,
    pub scaling_enabled: bool,
}

impl ClusterLedger {
    pub fn new(scaling_enabled: bool) -> Self {
        Self {
            cooldowns: CooldownState::default(),
            events: ScalingEventLog::new(),
            scaling_enabled,
        }
    }

    /// Append an event; a success also advances the cooldown for its kind.
    pub fn record(&mut self, event: ScalingEvent) {
        if event.succeeded() {
            self.cooldowns.record_success(event.action, event.timestamp);
        }
        self.events.append(event);
    }
}
