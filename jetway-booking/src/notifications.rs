use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jetway_core::notify::{NotificationSink, NotifyError};
use jetway_core::repository::BookingStore;
use jetway_shared::models::events::{NotificationEnvelope, NotificationEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::breaker::CircuitBreaker;

/// Events addressed to one user. The recipient address is resolved by the worker.
#[derive(Debug, Clone)]
pub struct Notification {
    pub user_id: i64,
    pub events: Vec<NotificationEvent>,
}

/// Hands notifications to a background worker after a transaction has committed.
/// `dispatch` never waits: a full or closed queue drops the message with a warning.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    pub fn spawn(
        store: Arc<dyn BookingStore>,
        sink: Arc<dyn NotificationSink>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let breaker = CircuitBreaker::new("notifications", 5, Duration::from_secs(30));
        let handle = tokio::spawn(run_worker(rx, store, sink, breaker));
        (Self { tx }, handle)
    }

    pub fn dispatch(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(user_id = n.user_id, events = n.events.len(), "notification queue full, dropping");
            }
            Err(TrySendError::Closed(n)) => {
                warn!(user_id = n.user_id, events = n.events.len(), "notification worker stopped, dropping");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Notification>,
    store: Arc<dyn BookingStore>,
    sink: Arc<dyn NotificationSink>,
    breaker: CircuitBreaker,
) {
    info!("Notification worker started");

    while let Some(notification) = rx.recv().await {
        let recipient = match store.user_email(notification.user_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                warn!(user_id = notification.user_id, "no e-mail on file, skipping notification");
                continue;
            }
            Err(e) => {
                error!(user_id = notification.user_id, error = %e, "failed to resolve recipient");
                continue;
            }
        };

        // Each event is delivered on its own; one failure does not hold back the rest.
        for event in notification.events {
            let key = event.key().to_string();
            if !breaker.check().await {
                warn!(%key, "notification channel open-circuited, dropping");
                continue;
            }

            let envelope = NotificationEnvelope::new(recipient.clone(), event);
            match sink.deliver(&envelope).await {
                Ok(()) => breaker.record_success().await,
                Err(e) => {
                    error!(%key, error = %e, "failed to deliver notification");
                    breaker.record_failure().await;
                }
            }
        }
    }

    info!("Notification worker stopped");
}

/// Sink that only writes a log line. Used when no message bus is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        info!(
            recipient = %envelope.recipient,
            subject = %envelope.subject,
            key = envelope.event.key(),
            "notification"
        );
        Ok(())
    }
}
