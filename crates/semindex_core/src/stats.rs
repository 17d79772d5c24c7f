//! Index statistics.
//!
//! Counters are updated by writes, the poller, and the reindexer, and can be
//! read at any time through [`SemanticIndex::stats`](crate::SemanticIndex::stats).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one semantic index.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Documents added to the live core.
    documents_indexed: AtomicU64,
    /// Documents deleted from the live core.
    documents_removed: AtomicU64,
    /// Poll ticks run.
    polls: AtomicU64,
    /// Poll ticks that stopped on an error.
    poll_failures: AtomicU64,
    /// Change batches fully applied and checkpointed.
    batches_applied: AtomicU64,
    /// Completed reindexes.
    reindexes_completed: AtomicU64,
    /// Aborted reindexes.
    reindexes_failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl IndexStats {
    /// Creates zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_indexed(&self) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.documents_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_failure(&self, error: &dyn std::fmt::Display) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(error);
    }

    pub(crate) fn record_batch(&self) {
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reindex(&self) {
        self.reindexes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reindex_failure(&self, error: &dyn std::fmt::Display) {
        self.reindexes_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(error);
    }

    fn set_last_error(&self, error: &dyn std::fmt::Display) {
        *self.last_error.lock() = Some(error.to_string());
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            documents_removed: self.documents_removed.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            reindexes_completed: self.reindexes_completed.load(Ordering::Relaxed),
            reindexes_failed: self.reindexes_failed.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// A point-in-time copy of [`IndexStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Documents added to the live core.
    pub documents_indexed: u64,
    /// Documents deleted from the live core.
    pub documents_removed: u64,
    /// Poll ticks run.
    pub polls: u64,
    /// Poll ticks that stopped on an error.
    pub poll_failures: u64,
    /// Change batches fully applied and checkpointed.
    pub batches_applied: u64,
    /// Completed reindexes.
    pub reindexes_completed: u64,
    /// Aborted reindexes.
    pub reindexes_failed: u64,
    /// Message of the most recent poll or reindex failure.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        assert_eq!(IndexStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn failures_keep_last_error() {
        let stats = IndexStats::new();
        stats.record_poll();
        stats.record_poll_failure(&"source down");
        stats.record_reindex_failure(&"core creation failed");

        let snap = stats.snapshot();
        assert_eq!(snap.polls, 1);
        assert_eq!(snap.poll_failures, 1);
        assert_eq!(snap.reindexes_failed, 1);
        assert_eq!(snap.last_error.as_deref(), Some("core creation failed"));
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(IndexStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_indexed();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().documents_indexed, 800);
    }
}
