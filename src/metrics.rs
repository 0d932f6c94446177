//! Consumer counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters maintained by the poll loop
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    records_consumed: AtomicU64,
    records_processed: AtomicU64,
    consume_errors: AtomicU64,
    deserialization_failures: AtomicU64,
    processing_failures: AtomicU64,
    offsets_committed: AtomicU64,
    commit_failures: AtomicU64,
}

impl ConsumerMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_consumed(&self) {
        self.records_consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_consume_errors(&self) {
        self.consume_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_deserialization_failures(&self) {
        self.deserialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_processing_failures(&self) {
        self.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_committed(&self) {
        self.offsets_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_consumed: self.records_consumed.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            consume_errors: self.consume_errors.load(Ordering::Relaxed),
            deserialization_failures: self.deserialization_failures.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
            offsets_committed: self.offsets_committed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Counter values captured by [`ConsumerMetrics::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Records pulled from the broker
    pub records_consumed: u64,
    /// Records that completed the processed path
    pub records_processed: u64,
    /// Broker-level poll failures
    pub consume_errors: u64,
    /// Records that failed key/value binding
    pub deserialization_failures: u64,
    /// Records rejected by the configured processor
    pub processing_failures: u64,
    /// Offsets committed
    pub offsets_committed: u64,
    /// Commit attempts rejected by the broker
    pub commit_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = ConsumerMetrics::new();
        metrics.increment_consumed();
        metrics.increment_consumed();
        metrics.increment_processed();
        metrics.increment_committed();
        metrics.increment_commit_failures();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_consumed, 2);
        assert_eq!(snapshot.records_processed, 1);
        assert_eq!(snapshot.offsets_committed, 1);
        assert_eq!(snapshot.commit_failures, 1);
        assert_eq!(snapshot.consume_errors, 0);
    }
}
