//! tierscale-notify: alert and scaling notifications.
//!
//! Delivery is best-effort. The dispatcher sends to every configured
//! channel concurrently, each under its own timeout, and reports a
//! per-channel result. Nothing here ever fails the control loop.
//!
//! # Architecture
//!
//! ```text
//! AlertDispatcher
//!   ├── WebhookNotifier → POST Notification as JSON
//!   ├── SlackNotifier   → POST Slack attachment message
//!   └── DispatchReport  ← one ChannelResult per channel
//! ```

pub mod dispatcher;
pub mod notification;
pub mod webhook;

pub use dispatcher::{AlertDispatcher, ChannelResult, DispatchReport, Notifier, NotifyError};
pub use notification::{Notification, NotificationDetails};
pub use webhook::{SlackNotifier, WebhookNotifier};
