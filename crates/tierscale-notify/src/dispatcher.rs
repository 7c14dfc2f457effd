//! Notification fan-out.
//!
//! Every channel is attempted on every dispatch, concurrently, each under
//! its own timeout. A failing or hung channel affects only its own entry in
//! the [`DispatchReport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use tierscale_core::config::AlertConfig;

use crate::notification::Notification;
use crate::webhook::{SlackNotifier, WebhookNotifier};

/// Delivery failure on a single channel.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("{channel}: request failed: {reason}")]
    Transport { channel: String, reason: String },

    #[error("{channel}: receiver responded with HTTP {status}")]
    Status { channel: String, status: u16 },

    #[error("{channel}: no response within {timeout:?}")]
    Timeout { channel: String, timeout: Duration },
}

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs and dispatch reports.
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug)]
pub struct ChannelResult {
    pub channel: String,
    pub result: Result<(), NotifyError>,
}

/// Per-channel outcome of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub results: Vec<ChannelResult>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.delivered()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Sends notifications to all configured channels.
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
    enabled: bool,
}

impl AlertDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            channels: Vec::new(),
            timeout,
            enabled: true,
        }
    }

    /// A dispatcher that drops everything.
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            timeout: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Build the channel list from the `[alerts]` config section.
    pub fn from_config(alerts: &AlertConfig, timeout: Duration) -> Self {
        if !alerts.enabled {
            return Self::disabled();
        }

        let mut dispatcher = Self::new(timeout);
        if let Some(url) = &alerts.webhook_url {
            dispatcher = dispatcher.with_channel(Arc::new(WebhookNotifier::new(url)));
        }
        if let Some(url) = &alerts.slack_webhook {
            dispatcher = dispatcher.with_channel(Arc::new(SlackNotifier::new(url)));
        }
        if dispatcher.channels.is_empty() {
            debug!("alerts enabled but no channels configured");
        }
        dispatcher
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Attempt delivery on every channel. Never fails.
    pub async fn dispatch(&self, notification: &Notification) -> DispatchReport {
        if !self.enabled || self.channels.is_empty() {
            return DispatchReport::default();
        }

        let sends = self.channels.iter().map(|channel| async move {
            let name = channel.name().to_string();
            let result = match tokio::time::timeout(self.timeout, channel.send(notification)).await
            {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout {
                    channel: name.clone(),
                    timeout: self.timeout,
                }),
            };
            ChannelResult {
                channel: name,
                result,
            }
        });

        let results = join_all(sends).await;

        let summary = notification.summary();
        for entry in &results {
            match &entry.result {
                Ok(()) => debug!(
                    channel = %entry.channel,
                    resource = %notification.resource_id,
                    kind = notification.kind(),
                    %summary,
                    "notification delivered"
                ),
                Err(e) => warn!(
                    channel = %entry.channel,
                    resource = %notification.resource_id,
                    kind = notification.kind(),
                    %summary,
                    error = %e,
                    "notification delivery failed"
                ),
            }
        }

        DispatchReport { results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    enum Behaviour {
        Succeed,
        Fail,
        Hang,
    }

    struct FakeChannel {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeChannel {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Notifier for FakeChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(NotifyError::Status {
                    channel: self.name.to_string(),
                    status: 500,
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn alert() -> Notification {
        Notification::alert("orders", vec!["High CPU utilization: 95.0%".into()], Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn failing_channels_do_not_block_others() {
        let ok = FakeChannel::new("ok", Behaviour::Succeed);
        let broken = FakeChannel::new("broken", Behaviour::Fail);
        let hung = FakeChannel::new("hung", Behaviour::Hang);

        let dispatcher = AlertDispatcher::new(Duration::from_secs(10))
            .with_channel(broken.clone())
            .with_channel(hung.clone())
            .with_channel(ok.clone());

        let report = dispatcher.dispatch(&alert()).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 2);
        assert!(matches!(
            report.results[1].result,
            Err(NotifyError::Timeout { .. })
        ));
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hung.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_dispatcher_sends_nothing() {
        let report = AlertDispatcher::disabled().dispatch(&alert()).await;
        assert!(report.is_empty());
    }

    #[test]
    fn from_config_builds_configured_channels() {
        let alerts = AlertConfig {
            enabled: true,
            webhook_url: Some("http://localhost:9000/hook".into()),
            slack_webhook: Some("https://hooks.slack.example/T000".into()),
        };
        let dispatcher = AlertDispatcher::from_config(&alerts, Duration::from_secs(5));
        assert_eq!(dispatcher.channel_count(), 2);
        assert!(dispatcher.is_enabled());

        let off = AlertDispatcher::from_config(
            &AlertConfig {
                enabled: false,
                ..alerts
            },
            Duration::from_secs(5),
        );
        assert_eq!(off.channel_count(), 0);
        assert!(!off.is_enabled());
    }
}
