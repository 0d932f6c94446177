//! Optional downstream processing step

use crate::error::ProcessFault;
use crate::record::ConsumedRecord;
use async_trait::async_trait;
use std::fmt::Debug;

/// Processes each bound record before it is reported and committed
///
/// A returned `Err` fires the `process-errored` channel and the record's
/// offset is NOT committed, so the record is redelivered after a restart
/// (at-least-once).
#[async_trait]
pub trait RecordProcessor<K, V>: Send + Sync + 'static {
    /// Error type for processing
    type Error: std::error::Error + Send + Sync + Debug + 'static;

    /// Process a single record
    async fn process(&self, record: &ConsumedRecord<K, V>) -> Result<(), Self::Error>;
}

/// Object-safe adapter so the loop can hold any processor
#[async_trait]
pub(crate) trait ErasedProcessor<K, V>: Send + Sync {
    async fn process(&self, record: &ConsumedRecord<K, V>) -> Result<(), ProcessFault>;
}

#[async_trait]
impl<K, V, P> ErasedProcessor<K, V> for P
where
    K: Send + Sync,
    V: Send + Sync,
    P: RecordProcessor<K, V>,
{
    async fn process(&self, record: &ConsumedRecord<K, V>) -> Result<(), ProcessFault> {
        RecordProcessor::process(self, record)
            .await
            .map_err(|e| Box::new(e) as ProcessFault)
    }
}
