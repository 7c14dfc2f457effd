//! HTTP notification channels.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};

use tierscale_core::ScalingAction;

use crate::dispatcher::{Notifier, NotifyError};
use crate::notification::{Notification, NotificationDetails};

/// Posts the [`Notification`] itself as JSON.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        post_json(&self.client, self.name(), &self.url, notification).await
    }
}

/// Posts a Slack incoming-webhook message with one attachment.
pub struct SlackNotifier {
    url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    /// Render the Slack message body for a notification.
    pub fn message(notification: &Notification) -> Value {
        let cluster = &notification.resource_id;
        let timestamp = notification.timestamp.to_rfc3339();
        let fallback = notification.summary();

        match &notification.details {
            NotificationDetails::Alert { alerts, .. } => {
                let bullets = alerts
                    .iter()
                    .map(|a| format!("• {a}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                json!({
                    "text": format!("Tierscale alert: {cluster}"),
                    "attachments": [{
                        "color": "warning",
                        "fallback": fallback,
                        "fields": [
                            { "title": "Cluster", "value": cluster, "short": true },
                            { "title": "Timestamp", "value": timestamp, "short": true },
                            { "title": "Alerts", "value": bullets, "short": false },
                        ],
                    }],
                })
            }
            NotificationDetails::ScalingAction {
                action,
                from_size,
                to_size,
                reason,
            } => {
                let color = match action {
                    ScalingAction::ScaleUp => "good",
                    _ => "warning",
                };
                json!({
                    "text": format!("Scaling action: {cluster}"),
                    "attachments": [{
                        "color": color,
                        "fallback": fallback,
                        "fields": [
                            { "title": "Action", "value": action_title(*action), "short": true },
                            { "title": "Size Change", "value": format!("{from_size} → {to_size}"), "short": true },
                            { "title": "Reason", "value": reason, "short": false },
                            { "title": "Timestamp", "value": timestamp, "short": true },
                        ],
                    }],
                })
            }
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = Self::message(notification);
        post_json(&self.client, self.name(), &self.url, &body).await
    }
}

fn action_title(action: ScalingAction) -> &'static str {
    match action {
        ScalingAction::ScaleUp => "Scale Up",
        ScalingAction::ScaleDown => "Scale Down",
        ScalingAction::Manual => "Manual",
    }
}

/// POST `body` as JSON; any non-2xx status is a failure.
async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    channel: &str,
    url: &str,
    body: &T,
) -> Result<(), NotifyError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| NotifyError::Transport {
            channel: channel.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(NotifyError::Status {
            channel: channel.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tierscale_core::{ScalingEvent, ScalingOutcome, Size};

    fn scale_down_event() -> ScalingEvent {
        ScalingEvent {
            cluster_id: "orders".into(),
            timestamp: Utc::now(),
            action: ScalingAction::ScaleDown,
            from_size: Size::from("M30"),
            to_size: Size::from("M20"),
            reason: "Low resource utilization".into(),
            outcome: ScalingOutcome::Success,
        }
    }

    #[test]
    fn slack_alert_lists_each_alert() {
        let n = Notification::alert(
            "orders",
            vec![
                "High CPU utilization: 95.0%".into(),
                "High IOPS: 1500".into(),
            ],
            Utc::now(),
        );
        let msg = SlackNotifier::message(&n);

        assert_eq!(msg["text"], "Tierscale alert: orders");
        let attachment = &msg["attachments"][0];
        assert_eq!(attachment["color"], "warning");
        assert_eq!(
            attachment["fallback"],
            "Alerts for orders: High CPU utilization: 95.0%; High IOPS: 1500"
        );
        assert_eq!(
            attachment["fields"][2]["value"],
            "• High CPU utilization: 95.0%\n• High IOPS: 1500"
        );
    }

    #[test]
    fn slack_scaling_message_shows_size_change() {
        let msg = SlackNotifier::message(&Notification::scaling(&scale_down_event()));
        let attachment = &msg["attachments"][0];

        assert_eq!(attachment["color"], "warning");
        assert_eq!(attachment["fields"][0]["value"], "Scale Down");
        assert_eq!(attachment["fields"][1]["value"], "M30 → M20");
        assert_eq!(
            attachment["fallback"],
            "Scaling scale_down: orders from M30 to M20. Reason: Low resource utilization"
        );
    }

    #[tokio::test]
    async fn unreachable_webhook_is_transport_error() {
        // Port 1 is reserved and nothing listens there.
        let notifier = WebhookNotifier::new("http://127.0.0.1:1/hook");
        let err = notifier
            .send(&Notification::scaling(&scale_down_event()))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport { ref channel, .. } if channel == "webhook"));
    }
}
