use async_trait::async_trait;
use jetway_shared::models::events::NotificationEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Outbound channel for customer notifications (mail relay, message bus, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError>;
}
