use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::notification::{Notification, NotificationLevel};
use crate::models::request::RequestId;

/// Fan-out of user-facing notifications. Sending never blocks; slow subscribers lag.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn notify(
        &self,
        level: NotificationLevel,
        message: impl Into<String>,
        request_id: Option<RequestId>,
    ) {
        let notification = Notification {
            message: message.into(),
            level,
            request_id,
            at: Utc::now(),
        };

        debug!(
            level = level.as_str(),
            message = %notification.message,
            "notification"
        );
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, message: impl Into<String>, request_id: Option<RequestId>) {
        self.notify(NotificationLevel::Info, message, request_id);
    }

    pub fn success(&self, message: impl Into<String>, request_id: Option<RequestId>) {
        self.notify(NotificationLevel::Success, message, request_id);
    }

    pub fn error(&self, message: impl Into<String>, request_id: Option<RequestId>) {
        self.notify(NotificationLevel::Error, message, request_id);
    }
}
