//! The semantic index state machine.
//!
//! A [`SemanticIndex`] keeps one search core in sync with an indexing
//! source. It is `ACTIVE` while the incremental poller follows the source,
//! and `REINDEXING` while a background reindex rebuilds the core after the
//! field program or the source epoch changed. Writes are rejected while
//! reindexing; reads keep hitting the current core.

use crate::config::IndexConfig;
use crate::core_manager::{CoreHandle, CoreManager};
use crate::error::{IndexError, IndexResult};
use crate::metadata::{keys, IndexMetadata};
use crate::poller::Worker;
use crate::program::FieldProgram;
use crate::registry::ConfigurationRegistry;
use crate::source::IndexingSource;
use crate::stats::{IndexStats, StatsSnapshot};
use crate::types::{ChangeSet, Document, Entity, Epoch, IndexId, IndexState, Revision};
use parking_lot::{Mutex, RwLock};
use semindex_storage::MetadataStore;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// The services an index works against.
#[derive(Clone)]
pub struct Collaborators {
    /// Change log the index follows.
    pub source: Arc<dyn IndexingSource>,
    /// Owner of the physical cores.
    pub cores: Arc<dyn CoreManager>,
    /// Where index metadata is persisted.
    pub metadata: Arc<dyn MetadataStore>,
    /// Tells whether the index is still configured on deactivation.
    pub registry: Arc<dyn ConfigurationRegistry>,
}

/// Position of an index in its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub(crate) epoch: Epoch,
    pub(crate) revision: Option<Revision>,
}

/// A semantic index over one search core.
pub struct SemanticIndex {
    pub(crate) id: IndexId,
    pub(crate) config: IndexConfig,
    pub(crate) program: FieldProgram,
    pub(crate) fingerprint: String,
    pub(crate) collaborators: Collaborators,
    pub(crate) state: RwLock<IndexState>,
    pub(crate) cursor: Mutex<Cursor>,
    pub(crate) handle: RwLock<Option<Arc<dyn CoreHandle>>>,
    /// Serializes index/remove calls and batch application.
    pub(crate) write_permit: Mutex<()>,
    /// Serializes poll ticks.
    pub(crate) poll_lock: Mutex<()>,
    pub(crate) poller: Mutex<Option<Worker>>,
    pub(crate) reindexer: Mutex<Option<JoinHandle<()>>>,
    pub(crate) reindex_running: AtomicBool,
    /// Set by every reindex request; a finishing worker reruns if it is set.
    pub(crate) reindex_requested: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) stats: IndexStats,
    pub(crate) self_ref: Weak<SemanticIndex>,
}

impl SemanticIndex {
    /// Activates an index.
    ///
    /// Without persisted metadata the core is created and the index starts
    /// `ACTIVE` at the source's current epoch with no revision. With
    /// metadata, a changed field program (or an interrupted reindex) starts a
    /// background reindex; otherwise the index resumes from the persisted
    /// cursor. A record whose core is gone gets a new core and replays the
    /// source from the start.
    pub fn activate(
        id: IndexId,
        config: IndexConfig,
        collaborators: Collaborators,
    ) -> IndexResult<Arc<Self>> {
        config.validate()?;
        let program = FieldProgram::parse(&config.program)?;
        if collaborators.source.name() != config.source_name {
            return Err(IndexError::configuration(
                keys::SOURCE_NAME,
                format!(
                    "indexing source {} was given for source name {}",
                    collaborators.source.name(),
                    config.source_name
                ),
            ));
        }
        let fingerprint = program.fingerprint();
        let persisted = IndexMetadata::load(collaborators.metadata.as_ref(), &id)?;

        let mut handle = None;
        let (state, cursor) = match persisted {
            None => {
                if collaborators.cores.is_managed_core(&config.name) {
                    return Err(IndexError::AlreadyExists {
                        name: config.name.clone(),
                    });
                }
                let epoch = collaborators.source.epoch()?;
                handle = Some(
                    collaborators
                        .cores
                        .create_core(&config.name, &program.schema())?,
                );
                info!(index = %config.name, id = %id, epoch = %epoch, "created index core");
                (
                    IndexState::Active,
                    Cursor {
                        epoch,
                        revision: None,
                    },
                )
            }
            Some(meta) => {
                check_unmodifiable(&meta.config, &config)?;
                let cursor = Cursor {
                    epoch: meta.epoch,
                    revision: meta.revision,
                };
                if !collaborators.cores.is_managed_core(&config.name) {
                    error!(
                        index = %config.name,
                        id = %id,
                        "index core is missing, recreating it and replaying the source"
                    );
                    let epoch = collaborators.source.epoch()?;
                    handle = Some(
                        collaborators
                            .cores
                            .create_core(&config.name, &program.schema())?,
                    );
                    (
                        IndexState::Active,
                        Cursor {
                            epoch,
                            revision: None,
                        },
                    )
                } else if meta.program_fingerprint != fingerprint {
                    info!(index = %config.name, "field program changed, reindexing");
                    (IndexState::Reindexing, cursor)
                } else if meta.state == IndexState::Reindexing {
                    info!(index = %config.name, "resuming interrupted reindex");
                    (IndexState::Reindexing, cursor)
                } else if meta.revision.is_none() {
                    let epoch = collaborators.source.epoch()?;
                    (
                        IndexState::Active,
                        Cursor {
                            epoch,
                            revision: None,
                        },
                    )
                } else {
                    (IndexState::Active, cursor)
                }
            }
        };

        let created = handle.is_some();
        let index = Arc::new_cyclic(|self_ref| Self {
            id,
            config,
            program,
            fingerprint,
            collaborators,
            state: RwLock::new(state),
            cursor: Mutex::new(cursor),
            handle: RwLock::new(handle),
            write_permit: Mutex::new(()),
            poll_lock: Mutex::new(()),
            poller: Mutex::new(None),
            reindexer: Mutex::new(None),
            reindex_running: AtomicBool::new(false),
            reindex_requested: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            stats: IndexStats::new(),
            self_ref: self_ref.clone(),
        });

        if let Err(e) = index.persist() {
            if created {
                if let Err(cleanup) = index.collaborators.cores.delete_core(index.name(), true) {
                    warn!(index = %index.name(), error = %cleanup, "failed to delete new core");
                }
            }
            return Err(e);
        }

        match state {
            IndexState::Reindexing => index.start_reindex(),
            IndexState::Active => index.start_poller()?,
        }
        info!(
            index = %index.name(),
            id = %index.id,
            state = %state,
            epoch = %cursor.epoch,
            revision = ?cursor.revision,
            "activated index"
        );
        Ok(index)
    }

    /// Stops the poller and any running reindex.
    ///
    /// If the registry no longer knows this index, its core and metadata are
    /// deleted as well; otherwise both are kept for a later activation.
    pub fn deactivate(&self) -> IndexResult<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stop_poller();
        self.await_reindex();
        // A reindex finishing concurrently may have restarted the poller.
        self.stop_poller();

        if self.collaborators.registry.is_configured(&self.id) {
            info!(index = %self.name(), "deactivated index");
            return Ok(());
        }

        *self.handle.write() = None;
        let cores = &self.collaborators.cores;
        if cores.is_managed_core(self.name()) {
            cores.delete_core(self.name(), true)?;
        }
        self.collaborators.metadata.delete(self.id.as_str())?;
        info!(index = %self.name(), id = %self.id, "deleted index core and metadata");
        Ok(())
    }

    /// Indexes an entity into the live core.
    pub fn index(&self, entity: &Entity) -> IndexResult<bool> {
        if entity.id.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "entity id cannot be empty".into(),
            ));
        }
        let _permit = self.write_permit.lock();
        self.ensure_writable()?;
        let core = self.core()?;
        let document = self.program.extract(entity, self.config.index_content)?;
        core.add(document)?;
        core.commit()?;
        self.stats.record_indexed();
        debug!(index = %self.name(), id = %entity.id, "indexed entity");
        Ok(true)
    }

    /// Removes a document from the live core.
    pub fn remove(&self, id: &str) -> IndexResult<()> {
        if id.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "document id cannot be empty".into(),
            ));
        }
        let _permit = self.write_permit.lock();
        self.ensure_writable()?;
        let core = self.core()?;
        core.delete_by_id(id)?;
        core.commit()?;
        self.stats.record_removed();
        debug!(index = %self.name(), id = %id, "removed document");
        Ok(())
    }

    /// Returns the field names of the core schema, or `None` if it has none.
    pub fn field_names(&self) -> IndexResult<Option<Vec<String>>> {
        let names = self.core()?.schema().field_names();
        Ok((!names.is_empty()).then_some(names))
    }

    /// Returns the schema properties of a field, or `None` if it is unknown.
    pub fn field_properties(&self, name: &str) -> IndexResult<Option<BTreeMap<String, String>>> {
        let schema = self.core()?.schema();
        Ok(schema.field(name).map(|spec| {
            let mut properties = spec.properties.clone();
            properties.insert("type".into(), spec.field_type.as_str().into());
            properties
        }))
    }

    /// Returns the ids of documents matching a query.
    pub fn search(&self, query: &str) -> IndexResult<Vec<String>> {
        Ok(self.core()?.search(query)?)
    }

    /// Returns a committed document.
    pub fn document(&self, id: &str) -> IndexResult<Option<Document>> {
        Ok(self.core()?.document(id))
    }

    /// Returns the number of committed documents.
    pub fn num_docs(&self) -> IndexResult<usize> {
        Ok(self.core()?.num_docs())
    }

    /// Returns the configuration id.
    pub fn id(&self) -> &IndexId {
        &self.id
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration the index was activated with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the fingerprint of the active field program.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> IndexState {
        *self.state.read()
    }

    /// Returns the source epoch the index follows.
    pub fn epoch(&self) -> Epoch {
        self.cursor.lock().epoch
    }

    /// Returns the last applied revision.
    pub fn revision(&self) -> Option<Revision> {
        self.cursor.lock().revision
    }

    /// Returns true while a reindex worker is running.
    pub fn is_reindex_running(&self) -> bool {
        self.reindex_running.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the index counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Waits for the running reindex worker, if any, to finish.
    pub fn await_reindex(&self) {
        let worker = self.reindexer.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!(index = %self.name(), "reindex worker panicked");
            }
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn ensure_writable(&self) -> IndexResult<()> {
        if self.is_shutting_down() {
            return Err(IndexError::Deactivated {
                name: self.name().to_string(),
            });
        }
        if !self.state().accepts_writes() {
            return Err(IndexError::MutationRejected {
                name: self.name().to_string(),
            });
        }
        Ok(())
    }

    /// Returns the live core handle, resolving it on first use.
    pub(crate) fn core(&self) -> IndexResult<Arc<dyn CoreHandle>> {
        if let Some(handle) = self.handle.read().as_ref() {
            return Ok(Arc::clone(handle));
        }
        let timeout = self.config.core_timeout;
        match self.collaborators.cores.core_handle(self.name(), timeout) {
            Some(handle) => {
                *self.handle.write() = Some(Arc::clone(&handle));
                Ok(handle)
            }
            None => {
                warn!(index = %self.name(), waited = ?timeout, "core unavailable");
                Err(IndexError::Unavailable {
                    core: self.name().to_string(),
                    waited: timeout,
                })
            }
        }
    }

    /// Applies a change batch to a core and commits it.
    ///
    /// Returns the number of upserted and deleted documents.
    pub(crate) fn apply_changes(
        &self,
        core: &dyn CoreHandle,
        changes: &ChangeSet,
    ) -> IndexResult<(usize, usize)> {
        let source = &self.collaborators.source;
        let (mut upserted, mut deleted) = (0, 0);
        for id in changes.iter() {
            match source.get(id)? {
                Some(entity) => {
                    core.add(self.program.extract(&entity, self.config.index_content)?)?;
                    upserted += 1;
                }
                None => {
                    core.delete_by_id(id)?;
                    deleted += 1;
                }
            }
        }
        core.commit()?;
        Ok((upserted, deleted))
    }

    pub(crate) fn persist(&self) -> IndexResult<()> {
        let cursor = *self.cursor.lock();
        self.persist_state(self.state(), cursor)
    }

    pub(crate) fn persist_state(&self, state: IndexState, cursor: Cursor) -> IndexResult<()> {
        IndexMetadata {
            config: self.config.clone(),
            program_fingerprint: self.fingerprint.clone(),
            epoch: cursor.epoch,
            revision: cursor.revision,
            state,
        }
        .save(self.collaborators.metadata.as_ref(), &self.id)
    }
}

impl fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("cursor", &*self.cursor.lock())
            .finish_non_exhaustive()
    }
}

/// Settings that cannot change once an index exists.
fn check_unmodifiable(persisted: &IndexConfig, config: &IndexConfig) -> IndexResult<()> {
    if persisted.name != config.name {
        return Err(IndexError::configuration(
            keys::NAME,
            format!(
                "index name cannot change from {} to {}",
                persisted.name, config.name
            ),
        ));
    }
    if persisted.source_name != config.source_name {
        return Err(IndexError::configuration(
            keys::SOURCE_NAME,
            format!(
                "indexing source cannot change from {} to {}",
                persisted.source_name, config.source_name
            ),
        ));
    }
    Ok(())
}
