//! Error types for the consumer utility

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Result alias used across the crate
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Type-erased error raised by a user-supplied [`RecordProcessor`]
///
/// [`RecordProcessor`]: crate::processor::RecordProcessor
pub type ProcessFault = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned synchronously by the consumer API
///
/// Steady-state faults (poll, deserialization, processing, commit) never
/// surface here; they are delivered through the event channels so the
/// caller does not need to wrap the running loop in error handling.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Broker client creation or topic subscription failed
    #[error("connection error: {0}")]
    Connection(String),

    /// `run` was called while the loop is already running
    #[error("consumer is already running")]
    AlreadyRunning,

    /// `run` was called on a handle that has been shut down
    #[error("consumer has been stopped")]
    Stopped,

    /// The background loop could not be joined cleanly
    #[error("shutdown error: {0}")]
    Shutdown(String),

    /// Underlying Kafka client error
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

/// Failure to convert raw broker bytes into a typed key or value
#[derive(Debug, Error)]
pub enum DeserializationError {
    /// The record carried no payload bytes
    #[error("record has no payload")]
    EmptyPayload,

    /// Bytes were not valid UTF-8
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Bytes were not valid JSON for the target type
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Fixed-width value had the wrong number of bytes
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required byte count for the target type
        expected: usize,
        /// Byte count actually received
        actual: usize,
    },
}

/// A fault observed while pulling or binding a record
///
/// Carried by the `consume-errored` event; the loop recovers from both
/// variants and keeps polling.
#[derive(Debug, Error)]
pub enum ConsumeFault {
    /// Broker-level poll failure
    #[error("broker poll failed: {0}")]
    Kafka(#[from] KafkaError),

    /// A record arrived but could not be bound to the subscribed types
    #[error("deserialization failed: {0}")]
    Deserialization(#[from] DeserializationError),
}
