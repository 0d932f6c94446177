//! Managed, event-driven Kafka consumer wrapper
//!
//! This library wraps an rdkafka stream consumer in a background poll
//! loop that binds raw records to typed keys and values, fans results out
//! to subscribed handlers, commits offsets in processing order, and shuts
//! down cooperatively.
//!
//! # Example
//!
//! ```no_run
//! use kafka_utility::{ConsumerConfig, ManagedConsumer, StringDeserializer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> kafka_utility::ConsumerResult<()> {
//! let config = ConsumerConfig::builder()
//!     .brokers("localhost:9092")
//!     .group_id("orders")
//!     .topic("orders-incoming")
//!     .build();
//!
//! let consumer = ManagedConsumer::<String, String, _, _>::connect(
//!     config,
//!     StringDeserializer,
//!     StringDeserializer,
//! )?;
//!
//! consumer.on_record_processed(|record| {
//!     tracing::info!(key = ?record.key(), value = %record.value(), "record");
//! });
//!
//! let cancellation = CancellationToken::new();
//! consumer.run_with_cancellation(cancellation.clone())?;
//!
//! // ... later: stop issuing polls and join the loop
//! cancellation.cancel();
//! consumer.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error channels
//!
//! Steady-state faults never reach the caller as `Err`: broker poll
//! failures and deserialization failures arrive on `consume-errored`,
//! processing failures on `process-errored`, and commit failures on
//! `commit-errored`. Only misuse (double start, bad configuration)
//! fails synchronously.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

// Re-export commonly used items
pub use config::{ConsumerConfig, ConsumerConfigBuilder};
pub use consumer::ManagedConsumer;
pub use error::{ConsumeFault, ConsumerError, ConsumerResult, DeserializationError, ProcessFault};
pub use events::ConsumeErrorContext;
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
pub use processor::RecordProcessor;
pub use record::{ConsumedRecord, RecordMetadata};
pub use serialization::{
    BytesDeserializer, Deserializer, I64Deserializer, JsonDeserializer, StringDeserializer,
};
pub use source::{KafkaSource, RecordSource};
pub use tokio_util::sync::CancellationToken;

/// Consumer configuration
pub mod config;

/// Managed consumer handle and poll loop
pub mod consumer;

/// Error types
pub mod error;

/// Event channels
pub mod events;

/// Consumer counters
pub mod metrics;

/// Per-partition offset cursors and commits
mod offsets;

/// Downstream processing step
pub mod processor;

/// Typed records
pub mod record;

/// Key/value deserializers
pub mod serialization;

/// Lifecycle and graceful shutdown
mod shutdown;

/// Broker client seam
pub mod source;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with default settings
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
