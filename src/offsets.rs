//! Per-partition offset cursors and the commit path

use crate::source::RecordSource;
use parking_lot::Mutex;
use rdkafka::error::KafkaError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a commit attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitOutcome {
    /// The offset was committed and the cursor advanced
    Committed,
    /// The offset was at or behind the cursor; nothing was sent
    Skipped,
}

/// Last-committed offset per `(topic, partition)`
///
/// Cursors are monotonically non-decreasing; the tracker refuses to move
/// a cursor backwards.
#[derive(Debug, Default)]
pub(crate) struct OffsetTracker {
    cursors: Mutex<HashMap<(String, i32), i64>>,
}

impl OffsetTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether `offset` is ahead of the partition's cursor
    pub(crate) fn is_ahead(&self, topic: &str, partition: i32, offset: i64) -> bool {
        let cursors = self.cursors.lock();
        match cursors.get(&(topic.to_string(), partition)) {
            Some(committed) => offset > *committed,
            None => true,
        }
    }

    /// Move the partition's cursor forward to `offset`
    pub(crate) fn advance(&self, topic: &str, partition: i32, offset: i64) {
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry((topic.to_string(), partition)).or_insert(offset);
        if offset > *cursor {
            *cursor = offset;
        }
    }

    /// Cursor position for a partition, if any offset was committed
    pub(crate) fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.cursors
            .lock()
            .get(&(topic.to_string(), partition))
            .copied()
    }
}

/// Commits consumed offsets through the record source
///
/// Commits happen in processing order, synchronously relative to the poll
/// loop. A failed commit is reported and NOT retried here: the cursor is
/// left untouched so the caller can re-drive with fresh broker state
/// instead of blindly re-issuing a possibly stale offset.
pub(crate) struct CommitManager<S> {
    source: Arc<S>,
    tracker: OffsetTracker,
}

impl<S: RecordSource> CommitManager<S> {
    pub(crate) fn new(source: Arc<S>) -> Self {
        Self {
            source,
            tracker: OffsetTracker::new(),
        }
    }

    /// Commit `offset` for `topic`/`partition`
    ///
    /// Stale offsets (at or behind the cursor) are skipped, keeping the
    /// cursor monotonic.
    pub(crate) fn commit(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<CommitOutcome, KafkaError> {
        if !self.tracker.is_ahead(topic, partition, offset) {
            warn!(topic, partition, offset, "skipping stale commit");
            return Ok(CommitOutcome::Skipped);
        }

        self.source.commit(topic, partition, offset)?;
        self.tracker.advance(topic, partition, offset);
        debug!(topic, partition, offset, "offset committed");
        Ok(CommitOutcome::Committed)
    }

    /// Cursor position for a partition, if any offset was committed
    pub(crate) fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.tracker.committed(topic, partition)
    }
}
