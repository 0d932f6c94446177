//! Multi-subscriber event channels for the consumer

use crate::error::{ConsumeFault, ProcessFault};
use crate::record::{ConsumedRecord, RecordMetadata};
use parking_lot::RwLock;
use rdkafka::error::KafkaError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// A consume fault paired with the record in flight when it occurred
///
/// `record` is `None` for broker-level poll failures, where no record was
/// read; it carries the raw metadata for deserialization failures.
#[derive(Debug)]
pub struct ConsumeErrorContext {
    /// What went wrong
    pub fault: ConsumeFault,
    /// The record in flight, if any
    pub record: Option<RecordMetadata>,
}

type RecordHandler<K, V> = Box<dyn Fn(&ConsumedRecord<K, V>) + Send + Sync>;
type ConsumeErrorHandler = Box<dyn Fn(&ConsumeErrorContext) + Send + Sync>;
type ProcessErrorHandler<K, V> = Box<dyn Fn(&ProcessFault, &ConsumedRecord<K, V>) + Send + Sync>;
type CommitErrorHandler<K, V> = Box<dyn Fn(&KafkaError, &ConsumedRecord<K, V>) + Send + Sync>;

/// Handler registries for the four notification channels
///
/// Handlers fire synchronously in registration order. A panicking handler
/// is caught at the dispatch boundary and logged; it neither prevents
/// later handlers from running nor stops the poll loop. Registration is
/// permitted while the loop is running.
pub(crate) struct EventDispatcher<K, V> {
    record_processed: RwLock<Vec<RecordHandler<K, V>>>,
    consume_errored: RwLock<Vec<ConsumeErrorHandler>>,
    process_errored: RwLock<Vec<ProcessErrorHandler<K, V>>>,
    commit_errored: RwLock<Vec<CommitErrorHandler<K, V>>>,
}

impl<K, V> EventDispatcher<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            record_processed: RwLock::new(Vec::new()),
            consume_errored: RwLock::new(Vec::new()),
            process_errored: RwLock::new(Vec::new()),
            commit_errored: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe_record_processed(&self, handler: RecordHandler<K, V>) {
        self.record_processed.write().push(handler);
    }

    pub(crate) fn subscribe_consume_errored(&self, handler: ConsumeErrorHandler) {
        self.consume_errored.write().push(handler);
    }

    pub(crate) fn subscribe_process_errored(&self, handler: ProcessErrorHandler<K, V>) {
        self.process_errored.write().push(handler);
    }

    pub(crate) fn subscribe_commit_errored(&self, handler: CommitErrorHandler<K, V>) {
        self.commit_errored.write().push(handler);
    }

    pub(crate) fn dispatch_record_processed(&self, record: &ConsumedRecord<K, V>) {
        for handler in self.record_processed.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(record))).is_err() {
                warn!(channel = "record-processed", "event handler panicked");
            }
        }
    }

    pub(crate) fn dispatch_consume_errored(&self, context: &ConsumeErrorContext) {
        for handler in self.consume_errored.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(context))).is_err() {
                warn!(channel = "consume-errored", "event handler panicked");
            }
        }
    }

    pub(crate) fn dispatch_process_errored(
        &self,
        fault: &ProcessFault,
        record: &ConsumedRecord<K, V>,
    ) {
        for handler in self.process_errored.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(fault, record))).is_err() {
                warn!(channel = "process-errored", "event handler panicked");
            }
        }
    }

    pub(crate) fn dispatch_commit_errored(
        &self,
        error: &KafkaError,
        record: &ConsumedRecord<K, V>,
    ) {
        for handler in self.commit_errored.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(error, record))).is_err() {
                warn!(channel = "commit-errored", "event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::StringDeserializer;
    use pretty_assertions::assert_eq;
    use rdkafka::message::OwnedMessage;
    use rdkafka::Timestamp;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn record(key: &str, value: &str) -> ConsumedRecord<String, String> {
        let msg = OwnedMessage::new(
            Some(value.as_bytes().to_vec()),
            Some(key.as_bytes().to_vec()),
            "topic".to_string(),
            Timestamp::CreateTime(0),
            0,
            1,
            None,
        );
        ConsumedRecord::bind(&msg, &StringDeserializer, &StringDeserializer).unwrap()
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let dispatcher = EventDispatcher::<String, String>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            dispatcher.subscribe_record_processed(Box::new(move |_| {
                order.lock().unwrap().push(tag);
            }));
        }

        dispatcher.dispatch_record_processed(&record("k", "v"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_handler_does_not_block_later_handlers() {
        let dispatcher = EventDispatcher::<String, String>::new();
        let reached = Arc::new(AtomicUsize::new(0));

        dispatcher.subscribe_record_processed(Box::new(|_| {
            panic!("misbehaving subscriber");
        }));
        let reached_clone = reached.clone();
        dispatcher.subscribe_record_processed(Box::new(move |_| {
            reached_clone.fetch_add(1, Ordering::SeqCst);
        }));

        dispatcher.dispatch_record_processed(&record("k", "v"));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_with_no_handlers_is_a_noop() {
        let dispatcher = EventDispatcher::<String, String>::new();
        dispatcher.dispatch_record_processed(&record("k", "v"));
        dispatcher.dispatch_consume_errored(&ConsumeErrorContext {
            fault: crate::error::DeserializationError::EmptyPayload.into(),
            record: None,
        });
    }

    #[test]
    fn handlers_receive_the_record() {
        let dispatcher = EventDispatcher::<String, String>::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        dispatcher.subscribe_record_processed(Box::new(move |r| {
            *seen_clone.lock().unwrap() = Some((r.key().cloned(), r.value().clone()));
        }));

        dispatcher.dispatch_record_processed(&record("abc", "xyz"));
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some((Some("abc".to_string()), "xyz".to_string()))
        );
    }
}
