use async_trait::async_trait;
use jetway_core::notify::{NotificationSink, NotifyError};
use jetway_shared::models::events::NotificationEnvelope;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    topic,
                    key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Published message"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, key, error = %e, "Failed to publish message");
                Err(e)
            }
        }
    }
}

/// Publishes notification envelopes as JSON; a mail service consumes the topic.
pub struct KafkaNotificationSink {
    producer: EventProducer,
    topic: String,
}

impl KafkaNotificationSink {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for KafkaNotificationSink {
    async fn deliver(&self, envelope: &NotificationEnvelope) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(envelope).map_err(|e| NotifyError::Rejected(e.to_string()))?;
        self.producer
            .publish(&self.topic, envelope.event.key(), &payload)
            .await
            .map_err(|e| NotifyError::Unavailable(e.to_string()))
    }
}
