//! The managed consumer handle and its background poll loop

use crate::config::ConsumerConfig;
use crate::error::{ConsumeFault, ConsumerResult, ProcessFault};
use crate::events::{ConsumeErrorContext, EventDispatcher};
use crate::metrics::{ConsumerMetrics, MetricsSnapshot};
use crate::offsets::{CommitManager, CommitOutcome};
use crate::processor::{ErasedProcessor, RecordProcessor};
use crate::record::{ConsumedRecord, RecordMetadata};
use crate::serialization::Deserializer;
use crate::shutdown::Lifecycle;
use crate::source::{KafkaSource, RecordSource};
use rdkafka::error::KafkaError;
use rdkafka::message::OwnedMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A managed Kafka consumer
///
/// Owns a background poll loop that pulls raw records, binds them to
/// `K`/`V` with the registered deserializers, notifies subscribers, and
/// commits offsets in processing order. All steady-state faults arrive
/// through the event channels; the loop never terminates on them.
///
/// # Examples
///
/// ```no_run
/// use kafka_utility::{ConsumerConfig, ManagedConsumer, StringDeserializer};
///
/// #[tokio::main]
/// async fn main() -> kafka_utility::ConsumerResult<()> {
///     let config = ConsumerConfig::builder()
///         .brokers("localhost:9092")
///         .group_id("my-group")
///         .topic("my-topic")
///         .build();
///
///     let consumer = ManagedConsumer::<String, String, _, _>::connect(
///         config,
///         StringDeserializer,
///         StringDeserializer,
///     )?;
///
///     consumer.on_record_processed(|record| {
///         println!("{:?} => {}", record.key(), record.value());
///     });
///     consumer.on_consume_errored(|context| {
///         eprintln!("consume fault: {}", context.fault);
///     });
///
///     consumer.run()?;
///
///     tokio::signal::ctrl_c().await.ok();
///     consumer.shutdown().await
/// }
/// ```
pub struct ManagedConsumer<K, V, KD, VD, S = KafkaSource> {
    config: ConsumerConfig,
    source: Arc<S>,
    key_deserializer: Arc<KD>,
    value_deserializer: Arc<VD>,
    dispatcher: Arc<EventDispatcher<K, V>>,
    commits: Arc<CommitManager<S>>,
    metrics: Arc<ConsumerMetrics>,
    processor: Option<Arc<dyn ErasedProcessor<K, V>>>,
    lifecycle: Lifecycle,
}

impl<K, V, KD, VD> ManagedConsumer<K, V, KD, VD, KafkaSource>
where
    KD: Deserializer<K>,
    VD: Deserializer<V>,
{
    /// Connect to the brokers in `config` and subscribe to its topics
    pub fn connect(
        config: ConsumerConfig,
        key_deserializer: KD,
        value_deserializer: VD,
    ) -> ConsumerResult<Self> {
        let source = KafkaSource::connect(&config)?;
        Ok(Self::from_source(
            source,
            config,
            key_deserializer,
            value_deserializer,
        ))
    }
}

impl<K, V, KD, VD, S> ManagedConsumer<K, V, KD, VD, S>
where
    KD: Deserializer<K>,
    VD: Deserializer<V>,
    S: RecordSource,
{
    /// Build a consumer over an injected record source
    pub fn from_source(
        source: S,
        config: ConsumerConfig,
        key_deserializer: KD,
        value_deserializer: VD,
    ) -> Self {
        let source = Arc::new(source);
        Self {
            commits: Arc::new(CommitManager::new(source.clone())),
            source,
            config,
            key_deserializer: Arc::new(key_deserializer),
            value_deserializer: Arc::new(value_deserializer),
            dispatcher: Arc::new(EventDispatcher::new()),
            metrics: Arc::new(ConsumerMetrics::new()),
            processor: None,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Attach a downstream processing step; must be set before `run`
    pub fn with_processor<P>(mut self, processor: P) -> Self
    where
        K: Send + Sync,
        V: Send + Sync,
        P: RecordProcessor<K, V>,
    {
        self.processor = Some(Arc::new(processor) as Arc<dyn ErasedProcessor<K, V>>);
        self
    }

    /// Subscribe to successfully processed records
    pub fn on_record_processed<F>(&self, handler: F)
    where
        F: Fn(&ConsumedRecord<K, V>) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_record_processed(Box::new(handler));
    }

    /// Subscribe to poll and deserialization faults
    pub fn on_consume_errored<F>(&self, handler: F)
    where
        F: Fn(&ConsumeErrorContext) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_consume_errored(Box::new(handler));
    }

    /// Subscribe to failures of the configured processing step
    pub fn on_process_errored<F>(&self, handler: F)
    where
        F: Fn(&ProcessFault, &ConsumedRecord<K, V>) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_process_errored(Box::new(handler));
    }

    /// Subscribe to offset commit failures
    pub fn on_commit_errored<F>(&self, handler: F)
    where
        F: Fn(&KafkaError, &ConsumedRecord<K, V>) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_commit_errored(Box::new(handler));
    }

    /// Point-in-time counter values
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Last committed offset for a partition, if any
    pub fn committed_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.commits.committed(topic, partition)
    }

    /// Whether the background loop is running
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// The configuration this consumer was built with
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }
}

impl<K, V, KD, VD, S> ManagedConsumer<K, V, KD, VD, S>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    KD: Deserializer<K> + 'static,
    VD: Deserializer<V> + 'static,
    S: RecordSource,
{
    /// Launch the background loop; returns once it has been spawned
    ///
    /// Fails with [`ConsumerError::AlreadyRunning`] if the loop is
    /// already running. The loop stops only via [`shutdown`] or drop.
    ///
    /// [`ConsumerError::AlreadyRunning`]: crate::error::ConsumerError::AlreadyRunning
    /// [`shutdown`]: ManagedConsumer::shutdown
    pub fn run(&self) -> ConsumerResult<()> {
        self.run_with_cancellation(CancellationToken::new())
    }

    /// Launch the background loop under the caller's cancellation token
    ///
    /// Once `cancellation` is triggered no new polls are issued; an
    /// iteration already polling completes, so the loop ends within one
    /// poll timeout window and no further events fire after that.
    pub fn run_with_cancellation(&self, cancellation: CancellationToken) -> ConsumerResult<()> {
        let engine = PollLoopEngine {
            source: self.source.clone(),
            key_deserializer: self.key_deserializer.clone(),
            value_deserializer: self.value_deserializer.clone(),
            dispatcher: self.dispatcher.clone(),
            commits: self.commits.clone(),
            metrics: self.metrics.clone(),
            processor: self.processor.clone(),
            poll_timeout: self.config.poll_timeout,
            manual_commits: !self.config.enable_auto_commit,
        };

        self.lifecycle
            .start(&cancellation, move |token| tokio::spawn(engine.run(token)))
    }

    /// Stop the loop and wait for it to finish
    ///
    /// Safe to call from any task, repeatedly, and on a handle that was
    /// never started.
    pub async fn shutdown(&self) -> ConsumerResult<()> {
        self.lifecycle.shutdown().await
    }
}

impl<K, V, KD, VD, S> Drop for ManagedConsumer<K, V, KD, VD, S> {
    fn drop(&mut self) {
        // Cannot join from a sync drop; the loop observes the token
        // within one poll timeout and releases the broker client.
        self.lifecycle.cancel();
    }
}

/// One iteration's worth of state, cloned into the background task
struct PollLoopEngine<K, V, KD, VD, S> {
    source: Arc<S>,
    key_deserializer: Arc<KD>,
    value_deserializer: Arc<VD>,
    dispatcher: Arc<EventDispatcher<K, V>>,
    commits: Arc<CommitManager<S>>,
    metrics: Arc<ConsumerMetrics>,
    processor: Option<Arc<dyn ErasedProcessor<K, V>>>,
    poll_timeout: Duration,
    manual_commits: bool,
}

impl<K, V, KD, VD, S> PollLoopEngine<K, V, KD, VD, S>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    KD: Deserializer<K> + 'static,
    VD: Deserializer<V> + 'static,
    S: RecordSource,
{
    async fn run(self, token: CancellationToken) {
        debug!("consumer loop started");

        loop {
            // Cancellation is observed here, before any new poll; a poll
            // already in flight below finishes its bounded window so a
            // half-read record is never dropped.
            if token.is_cancelled() {
                break;
            }

            match self.source.poll(self.poll_timeout).await {
                Ok(Some(message)) => self.handle_message(message).await,
                Ok(None) => {}
                Err(e) => {
                    self.metrics.increment_consume_errors();
                    warn!(error = %e, "poll failed");
                    self.dispatcher.dispatch_consume_errored(&ConsumeErrorContext {
                        fault: ConsumeFault::Kafka(e),
                        record: None,
                    });
                }
            }
        }

        debug!("consumer loop stopped");
    }

    async fn handle_message(&self, message: OwnedMessage) {
        self.metrics.increment_consumed();

        let record = match ConsumedRecord::bind(
            &message,
            &*self.key_deserializer,
            &*self.value_deserializer,
        ) {
            Ok(record) => record,
            Err(e) => {
                self.metrics.increment_deserialization_failures();
                let metadata = RecordMetadata::from_message(&message);
                warn!(
                    topic = %metadata.topic,
                    partition = metadata.partition,
                    offset = metadata.offset,
                    error = %e,
                    "failed to deserialize record"
                );
                self.dispatcher.dispatch_consume_errored(&ConsumeErrorContext {
                    fault: ConsumeFault::Deserialization(e),
                    record: Some(metadata),
                });
                return;
            }
        };

        if let Some(processor) = &self.processor {
            if let Err(fault) = processor.process(&record).await {
                self.metrics.increment_processing_failures();
                error!(
                    topic = record.topic(),
                    partition = record.partition(),
                    offset = record.offset(),
                    error = %fault,
                    "record processing failed"
                );
                self.dispatcher.dispatch_process_errored(&fault, &record);
                return;
            }
        }

        self.dispatcher.dispatch_record_processed(&record);
        self.metrics.increment_processed();

        if !self.manual_commits {
            return;
        }

        match self
            .commits
            .commit(record.topic(), record.partition(), record.offset())
        {
            Ok(CommitOutcome::Committed) => self.metrics.increment_committed(),
            Ok(CommitOutcome::Skipped) => {}
            Err(e) => {
                self.metrics.increment_commit_failures();
                error!(
                    topic = record.topic(),
                    partition = record.partition(),
                    offset = record.offset(),
                    error = %e,
                    "offset commit failed"
                );
                self.dispatcher.dispatch_commit_errored(&e, &record);
            }
        }
    }
}
