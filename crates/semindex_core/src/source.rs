//! Indexing sources.
//!
//! An indexing source exposes its items as a change log: within one epoch
//! every change carries a monotonic revision, and consumers page through it
//! with [`IndexingSource::changes`].

use crate::error::SourceError;
use crate::types::{ChangeSet, Entity, Epoch, Revision};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// A revisioned change log of entities.
pub trait IndexingSource: Send + Sync {
    /// Returns the name indexes refer to this source by.
    fn name(&self) -> &str;

    /// Returns the epoch the source currently serves.
    fn epoch(&self) -> Result<Epoch, SourceError>;

    /// Returns up to `batch_size` ids changed after `from`, in revision order.
    ///
    /// Fails with [`SourceError::EpochMismatch`] if `epoch` is not the
    /// active epoch.
    fn changes(
        &self,
        epoch: Epoch,
        from: Option<Revision>,
        batch_size: u32,
    ) -> Result<ChangeSet, SourceError>;

    /// Reads the current state of an entity; `None` if it was deleted.
    fn get(&self, id: &str) -> Result<Option<Entity>, SourceError>;
}

#[derive(Debug, Default)]
struct SourceState {
    epoch: u64,
    next_revision: u64,
    entities: HashMap<String, Entity>,
    /// Revision -> id. Each id appears once, at its latest revision.
    log: BTreeMap<u64, String>,
    latest: HashMap<String, u64>,
}

impl SourceState {
    fn record(&mut self, id: &str) -> Revision {
        if let Some(previous) = self.latest.remove(id) {
            self.log.remove(&previous);
        }
        let revision = self.next_revision;
        self.next_revision += 1;
        self.log.insert(revision, id.to_string());
        self.latest.insert(id.to_string(), revision);
        Revision(revision)
    }
}

/// In-memory indexing source.
///
/// Deletions stay in the log as tombstones so consumers observe them.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    state: RwLock<SourceState>,
}

impl MemorySource {
    /// Creates an empty source at epoch 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(SourceState {
                epoch: 1,
                ..SourceState::default()
            }),
        }
    }

    /// Stores an entity and logs the change.
    pub fn put(&self, entity: Entity) -> Revision {
        let mut state = self.state.write();
        let revision = state.record(&entity.id);
        state.entities.insert(entity.id.clone(), entity);
        revision
    }

    /// Deletes an entity and logs a tombstone.
    pub fn delete(&self, id: &str) -> Revision {
        let mut state = self.state.write();
        state.entities.remove(id);
        state.record(id)
    }

    /// Starts a new epoch whose log holds every live entity once.
    pub fn reset_epoch(&self) -> Epoch {
        let mut state = self.state.write();
        state.epoch += 1;
        state.next_revision = 0;
        state.log.clear();
        state.latest.clear();

        let mut ids: Vec<String> = state.entities.keys().cloned().collect();
        ids.sort();
        for id in ids {
            state.record(&id);
        }
        Epoch(state.epoch)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entities.len()
    }

    /// Returns true if the source holds no live entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the latest revision, if anything was logged in this epoch.
    #[must_use]
    pub fn head(&self) -> Option<Revision> {
        self.state
            .read()
            .log
            .keys()
            .next_back()
            .map(|r| Revision(*r))
    }

    /// Returns a snapshot of the live entities.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.state.read().entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }
}

impl IndexingSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn epoch(&self) -> Result<Epoch, SourceError> {
        Ok(Epoch(self.state.read().epoch))
    }

    fn changes(
        &self,
        epoch: Epoch,
        from: Option<Revision>,
        batch_size: u32,
    ) -> Result<ChangeSet, SourceError> {
        let state = self.state.read();
        if epoch.0 != state.epoch {
            return Err(SourceError::EpochMismatch {
                requested: epoch,
                active: Epoch(state.epoch),
            });
        }

        let start = from.map_or(0, |r| r.0.saturating_add(1));
        let mut ids = Vec::new();
        let mut to_revision = from;
        for (revision, id) in state.log.range(start..).take(batch_size as usize) {
            ids.push(id.clone());
            to_revision = Some(Revision(*revision));
        }

        Ok(ChangeSet {
            epoch,
            from,
            ids,
            to_revision,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Entity>, SourceError> {
        Ok(self.state.read().entities.get(id).cloned())
    }
}
