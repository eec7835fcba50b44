//! # Notification Delivery
//!
//! [`TracingNotifier`] writes each notification to the log; a real
//! transport (email, push) implements the same trait. With
//! `[notifications] enabled = false` the desk never calls a notifier.

use async_trait::async_trait;
use tracing::info;
use tripdesk_core::ports::{Notification, Notifier};

/// Logs notifications at INFO under the `tripdesk::notify` target.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        TracingNotifier
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) {
        info!(
            target: "tripdesk::notify",
            recipients = ?notification.recipient_ids,
            link = notification.link.as_deref().unwrap_or(""),
            title = %notification.title,
            "{}",
            notification.body
        );
    }
}
