//! Broker client seam: bounded-timeout polling and offset commits

use crate::config::ConsumerConfig;
use crate::error::{ConsumerError, ConsumerResult};
use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::OwnedMessage;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Raw-record supplier for the poll loop
///
/// The production implementation is [`KafkaSource`]; tests inject scripted
/// sources through [`ManagedConsumer::from_source`].
///
/// [`ManagedConsumer::from_source`]: crate::consumer::ManagedConsumer::from_source
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Pull the next record, waiting at most `timeout`
    ///
    /// `Ok(None)` means nothing arrived within the window; the loop polls
    /// again on its next iteration.
    async fn poll(&self, timeout: Duration) -> Result<Option<OwnedMessage>, KafkaError>;

    /// Commit `offset` as consumed for `topic`/`partition`
    ///
    /// The next fetch for the partition after a restart begins at
    /// `offset + 1`.
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), KafkaError>;
}

#[async_trait]
impl<T: RecordSource + ?Sized> RecordSource for Arc<T> {
    async fn poll(&self, timeout: Duration) -> Result<Option<OwnedMessage>, KafkaError> {
        (**self).poll(timeout).await
    }

    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), KafkaError> {
        (**self).commit(topic, partition, offset)
    }
}

/// Kafka properties callers may pass through to the underlying client
const ALLOWED_KAFKA_PROPS: &[&str] = &[
    // Compression settings
    "compression.type",
    "compression.level",
    // Fetch settings
    "fetch.min.bytes",
    "fetch.max.wait.ms",
    "fetch.max.bytes",
    "max.partition.fetch.bytes",
    // Request settings
    "request.timeout.ms",
    "metadata.max.age.ms",
    "receive.buffer.bytes",
    "send.buffer.bytes",
    // Consumer settings
    "queued.min.messages",
    "queued.max.messages.kbytes",
    "fetch.error.backoff.ms",
    "fetch.message.max.bytes",
    "max.poll.interval.ms",
    "heartbeat.interval.ms",
    // Connection settings
    "reconnect.backoff.ms",
    "reconnect.backoff.max.ms",
    "connections.max.idle.ms",
    "socket.keepalive.enable",
    // Monitoring
    "statistics.interval.ms",
];

/// [`RecordSource`] backed by an rdkafka [`StreamConsumer`]
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Create the broker client and subscribe to the configured topics
    pub fn connect(config: &ConsumerConfig) -> ConsumerResult<Self> {
        config.validate().map_err(ConsumerError::Config)?;

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            .set(
                "session.timeout.ms",
                config.session_timeout_ms.to_string(),
            )
            .set("auto.offset.reset", &config.auto_offset_reset);

        for (key, value) in &config.kafka_properties {
            if !ALLOWED_KAFKA_PROPS.contains(&key.as_str()) {
                return Err(ConsumerError::Config(format!(
                    "disallowed Kafka property '{}'",
                    key
                )));
            }
            client_config.set(key, value);
        }

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| ConsumerError::Connection(format!("failed to create consumer: {}", e)))?;

        let topics: Vec<&str> = config.topics.iter().map(|s| s.as_str()).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| ConsumerError::Connection(format!("failed to subscribe: {}", e)))?;

        info!(topics = ?config.topics, group = %config.group_id, "subscribed");

        Ok(Self { consumer })
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<OwnedMessage>, KafkaError> {
        let mut stream = self.consumer.stream();
        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(Ok(message))) => Ok(Some(message.detach())),
            Ok(Some(Err(e))) => Err(e),
            // The stream itself never ends while the consumer lives, but
            // treat exhaustion like an empty window.
            Ok(None) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), KafkaError> {
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
        self.consumer.commit(&assignment, CommitMode::Sync)
    }
}
