//! Outbound notifications to clients and back-office staff.
//!
//! Delivery is always best effort: a failed or slow notification is logged and
//! never affects the checkpoint or route transition that triggered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub severity: NotificationSeverity,
    /// Event kind the recipient's preferences are keyed on, e.g. `routeCompletion`
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        severity: NotificationSeverity,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            title: title.into(),
            body: body.into(),
            severity,
            kind: kind.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Recipient {0} not found")]
    UnknownRecipient(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Send a notification, swallowing failures and timeouts.
///
/// Returns whether the dispatcher accepted the notification.
pub async fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    notification: Notification,
    timeout: Duration,
) -> bool {
    let recipient = notification.recipient_id.clone();
    let kind = notification.kind.clone();

    match tokio::time::timeout(timeout, dispatcher.notify(notification)).await {
        Ok(Ok(())) => {
            debug!(recipient = %recipient, kind = %kind, "📨 Notification dispatched");
            true
        }
        Ok(Err(error)) => {
            warn!(recipient = %recipient, kind = %kind, error = %error, "⚠️ Notification dispatch failed");
            false
        }
        Err(_) => {
            warn!(
                recipient = %recipient,
                kind = %kind,
                timeout_ms = timeout.as_millis() as u64,
                "⏰ Notification dispatch timed out"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingDispatcher;

    #[async_trait]
    impl NotificationDispatcher for FailingDispatcher {
        async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
            Err(NotificationError::UnknownRecipient(notification.recipient_id))
        }
    }

    struct StalledDispatcher;

    #[async_trait]
    impl NotificationDispatcher for StalledDispatcher {
        async fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn notification() -> Notification {
        Notification::new("client-1", "Delivered", "Order finished", NotificationSeverity::Success, "routeCompletion")
            .with_metadata("routeId", "order-1")
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        assert!(!dispatch_best_effort(&FailingDispatcher, notification(), Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_dispatch_times_out() {
        assert!(!dispatch_best_effort(&StalledDispatcher, notification(), Duration::from_millis(50)).await);
    }
}
