//! Typed consumed records and raw record metadata

use crate::error::DeserializationError;
use crate::serialization::Deserializer;
use chrono::{DateTime, TimeZone, Utc};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::Timestamp;

/// A record pulled from the broker and bound to the subscribed types
///
/// Immutable once built; handlers receive it by reference and the record
/// is dropped at the end of its loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedRecord<K, V> {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<K>,
    value: V,
    timestamp: Option<DateTime<Utc>>,
}

impl<K, V> ConsumedRecord<K, V> {
    /// Bind a raw message using the given key and value deserializers
    ///
    /// A missing key binds to `None`; a missing payload is an error,
    /// since a record without a value cannot be delivered as `V`.
    pub(crate) fn bind<KD, VD>(
        message: &OwnedMessage,
        key_deserializer: &KD,
        value_deserializer: &VD,
    ) -> Result<Self, DeserializationError>
    where
        KD: Deserializer<K> + ?Sized,
        VD: Deserializer<V> + ?Sized,
    {
        let payload = message.payload().ok_or(DeserializationError::EmptyPayload)?;
        let value = value_deserializer.deserialize(payload)?;

        let key = match message.key() {
            Some(bytes) => Some(key_deserializer.deserialize(bytes)?),
            None => None,
        };

        Ok(Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key,
            value,
            timestamp: timestamp_to_datetime(message.timestamp()),
        })
    }

    /// Topic the record was read from
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition within the topic
    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Offset within the partition
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Deserialized key, if the record carried one
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Deserialized value
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Broker timestamp, if available
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Raw metadata for a record that could not be bound
///
/// Attached to `consume-errored` so callers can locate and, if they
/// choose, seek past a poison record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    /// Topic the record was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Broker timestamp, if available
    pub timestamp: Option<DateTime<Utc>>,
    /// Size of the raw key, if present
    pub key_len: Option<usize>,
    /// Size of the raw payload, if present
    pub payload_len: Option<usize>,
}

impl RecordMetadata {
    /// Extract metadata from a raw message
    pub fn from_message(message: &OwnedMessage) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            timestamp: timestamp_to_datetime(message.timestamp()),
            key_len: message.key().map(<[u8]>::len),
            payload_len: message.payload().map(<[u8]>::len),
        }
    }
}

fn timestamp_to_datetime(timestamp: Timestamp) -> Option<DateTime<Utc>> {
    match timestamp {
        Timestamp::NotAvailable => None,
        Timestamp::CreateTime(ms) | Timestamp::LogAppendTime(ms) => {
            Utc.timestamp_millis_opt(ms).single()
        }
    }
}
