//! Notification dispatcher
//!
//! Runs strictly after the workflow transaction commits. A failed or slow
//! sink can never roll back or delay a transition; delivery errors are
//! logged and swallowed.

use std::sync::Arc;
use tracing::{info, warn};

use caseflow_common::Notification;

/// Delivery channel for user-facing alerts
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Sink that records deliveries in the daemon log
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            "notify {} [{}] {}: {}",
            notification.recipient,
            notification.kind.as_str(),
            notification.title,
            notification.message
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Fire-and-forget delivery on a background task
    pub fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.deliver_all(&notifications);
        });
    }

    /// Deliver in order, logging failures without propagating them
    pub fn deliver_all(&self, notifications: &[Notification]) {
        for notification in notifications {
            if let Err(e) = self.sink.deliver(notification) {
                warn!(
                    "notification to {} via {} dropped: {}",
                    notification.recipient,
                    self.sink.name(),
                    e
                );
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_common::NotificationKind;
    use std::sync::Mutex;

    struct CollectingSink {
        delivered: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    impl NotificationSink for CollectingSink {
        fn name(&self) -> &'static str {
            "collecting"
        }

        fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(notification.recipient.as_str()) {
                anyhow::bail!("recipient unreachable");
            }
            self.delivered
                .lock()
                .unwrap()
                .push(notification.recipient.clone());
            Ok(())
        }
    }

    fn notification(recipient: &str) -> Notification {
        Notification::new(recipient, "c-1", NotificationKind::CaseApproved, "Case approved")
    }

    #[test]
    fn test_deliver_all_continues_past_failures() {
        let sink = Arc::new(CollectingSink {
            delivered: Mutex::new(Vec::new()),
            fail_for: Some("u-2".to_string()),
        });
        let dispatcher = NotificationDispatcher::new(sink.clone());

        dispatcher.deliver_all(&[notification("u-1"), notification("u-2"), notification("u-3")]);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(*delivered, vec!["u-1".to_string(), "u-3".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_is_a_noop_for_empty_batches() {
        let sink = Arc::new(CollectingSink {
            delivered: Mutex::new(Vec::new()),
            fail_for: None,
        });
        let dispatcher = NotificationDispatcher::new(sink.clone());
        dispatcher.dispatch(Vec::new());
        assert!(sink.delivered.lock().unwrap().is_empty());
    }
}
