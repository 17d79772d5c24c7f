//! Background reindexing.
//!
//! A reindex rebuilds the index from the whole change history into a
//! temporary core, swaps it in under the index name and deletes the
//! previous core. The live core keeps serving reads until the swap. Any
//! failure leaves the index `REINDEXING`, so it never silently serves a
//! partially built core.

use crate::core_manager::CoreHandle;
use crate::error::{IndexError, IndexResult};
use crate::index::{Cursor, SemanticIndex};
use crate::types::IndexState;
use std::sync::atomic::Ordering;
use std::thread;
use tracing::{error, info, warn};

impl SemanticIndex {
    /// Starts a reindex worker.
    ///
    /// If a worker is already running the request is queued: the worker
    /// runs once more if the index is still `REINDEXING` when it finishes.
    pub(crate) fn start_reindex(&self) {
        let Some(index) = self.self_ref.upgrade() else {
            return;
        };
        self.reindex_requested.store(true, Ordering::SeqCst);
        if self.reindex_running.swap(true, Ordering::SeqCst) {
            info!(index = %self.name(), "reindex already running, request queued");
            return;
        }

        let mut slot = self.reindexer.lock();
        if let Some(finished) = slot.take() {
            let _ = finished.join();
        }
        let spawned = thread::Builder::new()
            .name(format!("semindex-reindex-{}", self.name()))
            .spawn(move || index.run_reindex());
        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                self.reindex_running.store(false, Ordering::SeqCst);
                let e = IndexError::Worker(e);
                error!(index = %self.name(), error = %e, "cannot start reindex");
                self.stats.record_reindex_failure(&e);
            }
        }
    }

    fn run_reindex(&self) {
        loop {
            self.reindex_requested.store(false, Ordering::SeqCst);
            match self.reindex() {
                Ok(()) => {
                    self.stats.record_reindex();
                    info!(
                        index = %self.name(),
                        epoch = %self.epoch(),
                        revision = ?self.revision(),
                        "reindex completed"
                    );
                }
                Err(e) => {
                    error!(
                        index = %self.name(),
                        error = %e,
                        "reindex failed; index stays read-only until reconfigured"
                    );
                    self.stats.record_reindex_failure(&e);
                }
            }
            self.reindex_running.store(false, Ordering::SeqCst);

            // Requests that arrived while this pass ran. Clearing the running
            // flag first means a later request either sees it clear and
            // starts its own worker, or is seen here.
            if !self.reindex_requested.load(Ordering::SeqCst)
                || self.is_shutting_down()
                || self.state() != IndexState::Reindexing
            {
                return;
            }
            if self.reindex_running.swap(true, Ordering::SeqCst) {
                return;
            }
            info!(index = %self.name(), "rerunning reindex requested during the last pass");
        }
    }

    fn reindex(&self) -> IndexResult<()> {
        let name = self.name();
        let cores = &self.collaborators.cores;

        let temporary = (1..=u32::MAX)
            .map(|n| format!("{name}-{n}"))
            .find(|candidate| !cores.is_managed_core(candidate))
            .ok_or_else(|| self.replay_failure("no free temporary core name"))?;

        let core = cores
            .create_core(&temporary, &self.program.schema())
            .map_err(|e| self.replay_failure(format!("cannot create core {temporary}: {e}")))?;
        info!(index = %name, core = %temporary, "replaying history into temporary core");

        let replayed = self.replay(core.as_ref()).and_then(|cursor| {
            cores.swap_cores(name, &temporary)?;
            Ok(cursor)
        });
        let cursor = match replayed {
            Ok(cursor) => cursor,
            Err(e) => {
                if let Err(cleanup) = cores.delete_core(&temporary, true) {
                    warn!(core = %temporary, error = %cleanup, "failed to delete temporary core");
                }
                return Err(match e {
                    IndexError::ReplayFailure { .. } => e,
                    other => self.replay_failure(other.to_string()),
                });
            }
        };
        drop(core);

        // After the swap the temporary name holds the previous core.
        if let Err(e) = cores.delete_core(&temporary, true) {
            warn!(core = %temporary, error = %e, "failed to delete previous core");
        }

        let Some(handle) = cores.core_handle(name, self.config.core_timeout) else {
            *self.handle.write() = None;
            return Err(IndexError::Unavailable {
                core: name.to_string(),
                waited: self.config.core_timeout,
            });
        };
        {
            let _permit = self.write_permit.lock();
            self.persist_state(IndexState::Active, cursor)?;
            *self.handle.write() = Some(handle);
            *self.cursor.lock() = cursor;
            *self.state.write() = IndexState::Active;
        }

        if !self.is_shutting_down() {
            self.start_poller()?;
        }
        Ok(())
    }

    /// Applies the whole history of the source's current epoch to `core`.
    fn replay(&self, core: &dyn CoreHandle) -> IndexResult<Cursor> {
        let source = &self.collaborators.source;
        let mut cursor = Cursor {
            epoch: source.epoch()?,
            revision: None,
        };
        loop {
            if self.is_shutting_down() {
                return Err(self.replay_failure("interrupted by deactivation"));
            }
            let changes = source.changes(cursor.epoch, cursor.revision, self.config.batch_size)?;
            if changes.is_empty() {
                return Ok(cursor);
            }
            self.apply_changes(core, &changes)?;
            cursor.revision = changes.to_revision();
        }
    }

    fn replay_failure(&self, reason: impl Into<String>) -> IndexError {
        IndexError::ReplayFailure {
            name: self.name().to_string(),
            reason: reason.into(),
        }
    }
}
