//! Incremental polling.
//!
//! Each active index runs one poller thread. A tick drains the source's
//! change log batch by batch until it is caught up, checkpointing the
//! revision after every applied batch. Because the checkpoint follows the
//! apply, a crash in between replays the batch on restart; replays are
//! harmless since every change is a per-id overwrite.

use crate::error::{IndexError, IndexResult, SourceError};
use crate::index::{Cursor, SemanticIndex};
use crate::types::{Epoch, IndexState, Revision};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Batches applied and checkpointed.
    pub batches: usize,
    /// Documents upserted.
    pub indexed: usize,
    /// Documents deleted.
    pub removed: usize,
    /// Revision after the tick.
    pub revision: Option<Revision>,
    /// The source moved to a new epoch and a reindex was started.
    pub epoch_changed: bool,
}

/// Handle to a running poller thread.
#[derive(Debug)]
pub(crate) struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Signals the thread and waits for it. A tick in progress completes.
    pub(crate) fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("poller thread panicked");
        }
    }
}

impl SemanticIndex {
    /// Runs one poll tick on the calling thread.
    ///
    /// Ticks are serialized with the background poller. While the index is
    /// reindexing or deactivated the tick does nothing.
    pub fn poll_now(&self) -> IndexResult<PollReport> {
        self.tick()
    }

    /// Starts the poller, replacing a previous one.
    pub(crate) fn start_poller(&self) -> IndexResult<()> {
        let previous = self.poller.lock().take();
        if let Some(previous) = previous {
            previous.stop();
        }

        let (stop, signal) = mpsc::channel();
        let index = self.self_ref.clone();
        let period = self.config.check_period;
        let handle = thread::Builder::new()
            .name(format!("semindex-poll-{}", self.name()))
            .spawn(move || run(index, signal, period))
            .map_err(IndexError::Worker)?;
        // A concurrent start may have won; dropping its worker disconnects it.
        *self.poller.lock() = Some(Worker { stop, handle });
        debug!(index = %self.name(), period = ?period, "started poller");
        Ok(())
    }

    /// Returns true while a poller thread is running for this index.
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    pub(crate) fn stop_poller(&self) {
        let worker = self.poller.lock().take();
        if let Some(worker) = worker {
            worker.stop();
            debug!(index = %self.name(), "stopped poller");
        }
    }

    fn tick(&self) -> IndexResult<PollReport> {
        let _tick = self.poll_lock.lock();
        let mut report = PollReport {
            revision: self.revision(),
            ..PollReport::default()
        };
        if self.is_shutting_down() || !self.state().accepts_writes() {
            return Ok(report);
        }

        self.stats.record_poll();
        match self.drain(&mut report) {
            Ok(()) => Ok(report),
            Err(IndexError::Source(SourceError::EpochMismatch { requested, active }))
                if active > requested =>
            {
                self.switch_epoch(requested, active)?;
                report.epoch_changed = true;
                Ok(report)
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(index = %self.name(), error = %e, "poll tick failed, retrying next tick");
                } else {
                    error!(index = %self.name(), error = %e, "poll tick failed");
                }
                self.stats.record_poll_failure(&e);
                Err(e)
            }
        }
    }

    fn drain(&self, report: &mut PollReport) -> IndexResult<()> {
        let core = self.core()?;
        let source = &self.collaborators.source;
        loop {
            if self.is_shutting_down() {
                return Ok(());
            }
            let cursor = *self.cursor.lock();
            let changes = source.changes(cursor.epoch, cursor.revision, self.config.batch_size)?;
            if changes.is_empty() {
                return Ok(());
            }

            let _permit = self.write_permit.lock();
            let (indexed, removed) = self.apply_changes(core.as_ref(), &changes)?;
            let next = Cursor {
                epoch: cursor.epoch,
                revision: changes.to_revision(),
            };
            self.persist_state(IndexState::Active, next)?;
            *self.cursor.lock() = next;

            for _ in 0..indexed {
                self.stats.record_indexed();
            }
            for _ in 0..removed {
                self.stats.record_removed();
            }
            self.stats.record_batch();
            report.batches += 1;
            report.indexed += indexed;
            report.removed += removed;
            report.revision = next.revision;
            debug!(
                index = %self.name(),
                changes = changes.len(),
                revision = ?next.revision,
                "applied change batch"
            );
        }
    }

    fn switch_epoch(&self, requested: Epoch, active: Epoch) -> IndexResult<()> {
        {
            let _permit = self.write_permit.lock();
            let cursor = Cursor {
                epoch: active,
                revision: None,
            };
            self.persist_state(IndexState::Reindexing, cursor)?;
            *self.state.write() = IndexState::Reindexing;
            *self.cursor.lock() = cursor;
        }
        // The poller is restarted by the reindexer. Dropping the worker
        // disconnects its stop channel so the thread exits after this tick;
        // joining here would deadlock when called from the poller itself.
        drop(self.poller.lock().take());
        info!(
            index = %self.name(),
            from = %requested,
            to = %active,
            "source epoch changed, reindexing"
        );
        self.start_reindex();
        Ok(())
    }
}

fn run(index: Weak<SemanticIndex>, stop: Receiver<()>, period: Duration) {
    loop {
        {
            let Some(index) = index.upgrade() else {
                return;
            };
            if index.shutdown.load(Ordering::SeqCst) {
                return;
            }
            // Failures are logged and counted by the tick; the next tick retries.
            let report = index.tick();
            if matches!(report, Ok(PollReport { epoch_changed: true, .. }))
                || !index.state().accepts_writes()
            {
                debug!(index = %index.name(), "poller exiting, index is reindexing");
                return;
            }
        }
        match stop.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
