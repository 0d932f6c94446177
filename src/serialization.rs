//! Deserializers binding raw broker bytes to typed keys and values

use crate::error::DeserializationError;
use byteorder::{BigEndian, ByteOrder};
use serde::de::DeserializeOwned;

/// Converts raw record bytes into a value of type `T`
///
/// Implementations must be cheap to call per record; they run inside the
/// poll loop. A failure is reported through the `consume-errored` channel
/// and never stops the loop.
pub trait Deserializer<T>: Send + Sync {
    /// Deserialize bytes into a value
    fn deserialize(&self, bytes: &[u8]) -> Result<T, DeserializationError>;
}

/// UTF-8 string deserializer
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDeserializer;

impl Deserializer<String> for StringDeserializer {
    fn deserialize(&self, bytes: &[u8]) -> Result<String, DeserializationError> {
        let s = std::str::from_utf8(bytes)?;
        Ok(s.to_owned())
    }
}

/// JSON deserializer for any `serde`-deserializable type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeserializer;

impl<T> Deserializer<T> for JsonDeserializer
where
    T: DeserializeOwned,
{
    fn deserialize(&self, bytes: &[u8]) -> Result<T, DeserializationError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Big-endian signed 64-bit integer deserializer
///
/// Matches the network-order framing the stock Kafka client serializers
/// use for long keys and values.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Deserializer;

impl Deserializer<i64> for I64Deserializer {
    fn deserialize(&self, bytes: &[u8]) -> Result<i64, DeserializationError> {
        if bytes.len() != 8 {
            return Err(DeserializationError::InvalidLength {
                expected: 8,
                actual: bytes.len(),
            });
        }
        Ok(BigEndian::read_i64(bytes))
    }
}

/// Pass-through deserializer yielding the raw bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDeserializer;

impl Deserializer<Vec<u8>> for BytesDeserializer {
    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, DeserializationError> {
        Ok(bytes.to_vec())
    }
}
