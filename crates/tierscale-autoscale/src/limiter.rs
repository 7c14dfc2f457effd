//! Rate limiting: per-kind cooldown plus a rolling hourly quota.
//!
//! Both gates read the cluster's [`ClusterLedger`]. The quota is counted
//! from the event log rather than a separate counter.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use tierscale_core::ScalingAction;
use tierscale_core::config::ScalingConfig;

use crate::evaluator::Recommendation;
use crate::events::ClusterLedger;

const QUOTA_WINDOW: TimeDelta = TimeDelta::hours(1);

/// Result of gating a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum Admission {
    Admitted,
    /// Last success of this kind was too recent.
    Cooldown { remaining: Duration },
    /// `count` successes in the trailing hour already reached `cap`.
    QuotaExhausted { count: usize, cap: u32 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    scale_up_cooldown: Duration,
    scale_down_cooldown: Duration,
    max_scale_up_per_hour: u32,
    max_scale_down_per_hour: u32,
}

impl RateLimiter {
    pub fn new(
        scale_up_cooldown: Duration,
        scale_down_cooldown: Duration,
        max_scale_up_per_hour: u32,
        max_scale_down_per_hour: u32,
    ) -> Self {
        Self {
            scale_up_cooldown,
            scale_down_cooldown,
            max_scale_up_per_hour,
            max_scale_down_per_hour,
        }
    }

    pub fn from_config(scaling: &ScalingConfig) -> Self {
        Self::new(
            scaling.scale_up_cooldown,
            scaling.scale_down_cooldown,
            scaling.max_scale_up_per_hour,
            scaling.max_scale_down_per_hour,
        )
    }

    /// Gate `recommendation` for the cluster owning `ledger`.
    pub fn check(
        &self,
        ledger: &ClusterLedger,
        recommendation: &Recommendation,
        now: DateTime<Utc>,
    ) -> Admission {
        let Some(action) = recommendation.action() else {
            return Admission::Admitted;
        };
        let (cooldown, cap) = match action {
            ScalingAction::ScaleUp => (self.scale_up_cooldown, self.max_scale_up_per_hour),
            ScalingAction::ScaleDown => (self.scale_down_cooldown, self.max_scale_down_per_hour),
            ScalingAction::Manual => return Admission::Admitted,
        };

        if let Some(last) = ledger.cooldowns.last_success(action) {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < cooldown {
                return Admission::Cooldown {
                    remaining: cooldown - elapsed,
                };
            }
        }

        let count = ledger.events.successes_since(action, now - QUOTA_WINDOW);
        if count >= cap as usize {
            return Admission::QuotaExhausted { count, cap };
        }

        Admission::Admitted
    }

    pub fn admit(
        &self,
        ledger: &ClusterLedger,
        recommendation: &Recommendation,
        now: DateTime<Utc>,
    ) -> bool {
        self.check(ledger, recommendation, now).is_admitted()
    }
}
