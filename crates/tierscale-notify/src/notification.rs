//! Notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tierscale_core::{ScalingAction, ScalingEvent, Size};

/// A structured record delivered to every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub resource_id: String,
    #[serde(flatten)]
    pub details: NotificationDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationDetails {
    /// One or more metrics at or above their high threshold.
    Alert { alerts: Vec<String> },
    /// A resize was carried out.
    ScalingAction {
        action: ScalingAction,
        from_size: Size,
        to_size: Size,
        reason: String,
    },
}

impl Notification {
    pub fn alert(resource_id: &str, alerts: Vec<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            resource_id: resource_id.to_string(),
            details: NotificationDetails::Alert { alerts },
        }
    }

    /// Announce a completed scaling event.
    pub fn scaling(event: &ScalingEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            resource_id: event.cluster_id.clone(),
            details: NotificationDetails::ScalingAction {
                action: event.action,
                from_size: event.from_size.clone(),
                to_size: event.to_size.clone(),
                reason: event.reason.clone(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.details {
            NotificationDetails::Alert { .. } => "alert",
            NotificationDetails::ScalingAction { .. } => "scaling_action",
        }
    }

    /// One-line plain-text rendering, used in delivery logs and as the
    /// Slack fallback text.
    pub fn summary(&self) -> String {
        match &self.details {
            NotificationDetails::Alert { alerts, .. } => {
                format!("Alerts for {}: {}", self.resource_id, alerts.join("; "))
            }
            NotificationDetails::ScalingAction {
                action,
                from_size,
                to_size,
                reason,
            } => format!(
                "Scaling {action}: {} from {from_size} to {to_size}. Reason: {reason}",
                self.resource_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierscale_core::ScalingOutcome;

    #[test]
    fn scaling_notification_serializes_flat() {
        let event = ScalingEvent {
            cluster_id: "orders".to_string(),
            timestamp: Utc::now(),
            action: ScalingAction::ScaleUp,
            from_size: Size::from("M10"),
            to_size: Size::from("M20"),
            reason: "High CPU: 95.0%".to_string(),
            outcome: ScalingOutcome::Success,
        };
        let n = Notification::scaling(&event);
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["kind"], "scaling_action");
        assert_eq!(json["resource_id"], "orders");
        assert_eq!(json["action"], "scale_up");
        assert_eq!(json["to_size"], "M20");
        assert_eq!(
            n.summary(),
            "Scaling scale_up: orders from M10 to M20. Reason: High CPU: 95.0%"
        );
    }

    #[test]
    fn alert_summary_joins_conditions() {
        let n = Notification::alert(
            "orders",
            vec!["High IOPS: 1500".to_string(), "High CPU: 91.0%".to_string()],
            Utc::now(),
        );
        assert_eq!(n.kind(), "alert");
        assert_eq!(
            n.summary(),
            "Alerts for orders: High IOPS: 1500; High CPU: 91.0%"
        );

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "alert");
        assert_eq!(json["alerts"][1], "High CPU: 91.0%");
    }
}
