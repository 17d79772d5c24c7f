//! Index supervisor.
//!
//! The manager owns the collaborators shared by all indexes, wires them into
//! every [`SemanticIndex`] it activates and drives the configuration
//! lifecycle: create, reconfigure, remove, restore after a restart, and
//! shutdown.

use crate::config::IndexConfig;
use crate::core_manager::CoreManager;
use crate::error::{IndexError, IndexResult};
use crate::index::{Collaborators, SemanticIndex};
use crate::metadata::{keys, IndexMetadata};
use crate::registry::{ConfigurationRegistry, Configurations};
use crate::source::IndexingSource;
use crate::types::IndexId;
use parking_lot::{Mutex, RwLock};
use semindex_storage::MetadataStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Creates, reconfigures and removes semantic indexes.
pub struct SemanticIndexManager {
    cores: Arc<dyn CoreManager>,
    metadata: Arc<dyn MetadataStore>,
    registry: Arc<Configurations>,
    sources: RwLock<HashMap<String, Arc<dyn IndexingSource>>>,
    indexes: RwLock<BTreeMap<IndexId, Arc<SemanticIndex>>>,
    /// Serializes lifecycle operations.
    lifecycle: Mutex<()>,
}

impl SemanticIndexManager {
    /// Creates a manager without sources or indexes.
    pub fn new(cores: Arc<dyn CoreManager>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            cores,
            metadata,
            registry: Arc::new(Configurations::new()),
            sources: RwLock::new(HashMap::new()),
            indexes: RwLock::new(BTreeMap::new()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Makes a source available to indexes under its name.
    pub fn register_source(&self, source: Arc<dyn IndexingSource>) {
        let name = source.name().to_string();
        if self.sources.write().insert(name.clone(), source).is_some() {
            warn!(source = %name, "replaced indexing source");
        }
    }

    /// Creates an index under a generated id.
    pub fn create_index(&self, config: IndexConfig) -> IndexResult<Arc<SemanticIndex>> {
        self.create_index_with_id(IndexId::generate(), config)
    }

    /// Creates an index under the given id.
    ///
    /// Fails if the id or the name is already in use.
    pub fn create_index_with_id(
        &self,
        id: IndexId,
        config: IndexConfig,
    ) -> IndexResult<Arc<SemanticIndex>> {
        let _guard = self.lifecycle.lock();
        config.validate()?;
        if self.registry.is_configured(&id) || self.metadata.contains(id.as_str())? {
            return Err(IndexError::InvalidArgument(format!(
                "index id {id} is already in use"
            )));
        }
        if self.registry.find_by_name(&config.name).is_some()
            || self.cores.is_managed_core(&config.name)
        {
            return Err(IndexError::AlreadyExists { name: config.name });
        }

        let index = self.activate(id.clone(), config)?;
        info!(index = %index.name(), id = %id, "created index");
        Ok(index)
    }

    /// Applies a new configuration to an existing index.
    ///
    /// The running instance is deactivated (its core kept) and a new one is
    /// activated; a changed field program makes it reindex. Rejected while a
    /// reindex of the index is still running. If the new configuration fails
    /// to activate, the previous one is restored.
    pub fn reconfigure(&self, id: &IndexId, config: IndexConfig) -> IndexResult<Arc<SemanticIndex>> {
        let _guard = self.lifecycle.lock();
        config.validate()?;
        let current = self
            .get(id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))?;
        if current.is_reindex_running() {
            return Err(IndexError::ReindexInProgress {
                name: current.name().to_string(),
            });
        }
        let previous = current.config().clone();
        if previous.name != config.name {
            return Err(IndexError::configuration(
                keys::NAME,
                "index name cannot be changed",
            ));
        }
        self.source(&config.source_name)?;

        current.deactivate()?;
        self.indexes.write().remove(id);
        match self.activate(id.clone(), config) {
            Ok(index) => {
                info!(index = %index.name(), state = %index.state(), "reconfigured index");
                Ok(index)
            }
            Err(e) => {
                warn!(index = %previous.name, error = %e, "reconfiguration failed, restoring");
                if let Err(restore) = self.activate(id.clone(), previous) {
                    error!(id = %id, error = %restore, "failed to restore previous configuration");
                }
                Err(e)
            }
        }
    }

    /// Removes an index, deleting its core and metadata.
    pub fn remove_index(&self, id: &IndexId) -> IndexResult<()> {
        let _guard = self.lifecycle.lock();
        let index = self
            .indexes
            .write()
            .remove(id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))?;
        self.registry.remove(id);
        index.deactivate()?;
        info!(index = %index.name(), id = %id, "removed index");
        Ok(())
    }

    /// Activates every index recorded in the metadata store.
    ///
    /// Indexes that fail to activate are logged and skipped. Returns the ids
    /// that were activated.
    pub fn restore(&self) -> IndexResult<Vec<IndexId>> {
        let _guard = self.lifecycle.lock();
        let mut restored = Vec::new();
        for raw in self.metadata.ids()? {
            let id = IndexId::new(raw);
            if self.indexes.read().contains_key(&id) {
                continue;
            }
            let Some(meta) = IndexMetadata::load(self.metadata.as_ref(), &id)? else {
                continue;
            };
            match self.activate(id.clone(), meta.config) {
                Ok(index) => {
                    info!(index = %index.name(), id = %id, state = %index.state(), "restored index");
                    restored.push(id);
                }
                Err(e) => error!(id = %id, error = %e, "failed to restore index"),
            }
        }
        Ok(restored)
    }

    /// Deactivates every index, keeping cores and metadata.
    pub fn shutdown(&self) {
        let _guard = self.lifecycle.lock();
        let indexes = std::mem::take(&mut *self.indexes.write());
        for (id, index) in indexes {
            if let Err(e) = index.deactivate() {
                error!(id = %id, error = %e, "failed to deactivate index");
            }
        }
        info!("semantic index manager shut down");
    }

    /// Returns the index with the given id.
    #[must_use]
    pub fn get(&self, id: &IndexId) -> Option<Arc<SemanticIndex>> {
        self.indexes.read().get(id).cloned()
    }

    /// Returns the index with the given name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<SemanticIndex>> {
        self.indexes
            .read()
            .values()
            .find(|index| index.name() == name)
            .cloned()
    }

    /// Returns the ids of all active indexes.
    #[must_use]
    pub fn ids(&self) -> Vec<IndexId> {
        self.indexes.read().keys().cloned().collect()
    }

    fn source(&self, name: &str) -> IndexResult<Arc<dyn IndexingSource>> {
        self.sources.read().get(name).cloned().ok_or_else(|| {
            IndexError::configuration(keys::SOURCE_NAME, format!("no indexing source named {name}"))
        })
    }

    /// Registers and activates a configuration; unregisters it on failure.
    fn activate(&self, id: IndexId, config: IndexConfig) -> IndexResult<Arc<SemanticIndex>> {
        let collaborators = Collaborators {
            source: self.source(&config.source_name)?,
            cores: Arc::clone(&self.cores),
            metadata: Arc::clone(&self.metadata),
            registry: self.registry.clone(),
        };
        let previous = self.registry.insert(id.clone(), config.clone());
        match SemanticIndex::activate(id.clone(), config, collaborators) {
            Ok(index) => {
                self.indexes.write().insert(id, Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                match previous {
                    Some(previous) => self.registry.insert(id, previous),
                    None => self.registry.remove(&id),
                };
                Err(e)
            }
        }
    }
}

impl Drop for SemanticIndexManager {
    fn drop(&mut self) {
        for index in self.indexes.get_mut().values() {
            if let Err(e) = index.deactivate() {
                warn!(index = %index.name(), error = %e, "failed to deactivate index on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_core::MemoryCoreManager;
    use crate::source::MemorySource;
    use crate::types::{Entity, IndexState};
    use semindex_storage::MemoryMetadataStore;
    use std::time::Duration;

    const V1: &str = "title = dc:title :: text ;";
    const V2: &str = "title = dc:title :: text ; subject = dc:subject :: string ;";

    fn config(name: &str, program: &str) -> IndexConfig {
        IndexConfig::new(name, program).with_check_period(Duration::from_secs(3600))
    }

    fn manager() -> (SemanticIndexManager, Arc<MemorySource>, Arc<MemoryCoreManager>) {
        let source = Arc::new(MemorySource::new("default"));
        source.put(Entity::new("urn:1").with_property("dc:title", "first"));
        let cores = Arc::new(MemoryCoreManager::new());
        let manager = SemanticIndexManager::new(cores.clone(), Arc::new(MemoryMetadataStore::new()));
        manager.register_source(source.clone());
        (manager, source, cores)
    }

    #[test]
    fn create_and_lookup() {
        let (manager, _source, _cores) = manager();
        let index = manager.create_index(config("articles", V1)).unwrap();

        assert_eq!(manager.ids(), vec![index.id().clone()]);
        assert!(manager.get(index.id()).is_some());
        assert_eq!(
            manager.get_by_name("articles").unwrap().id(),
            index.id()
        );
        assert!(manager.get_by_name("other").is_none());
        manager.shutdown();
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let (manager, _source, _cores) = manager();
        manager.create_index(config("articles", V1)).unwrap();
        assert!(matches!(
            manager.create_index(config("articles", V2)),
            Err(IndexError::AlreadyExists { .. })
        ));
        assert_eq!(manager.ids().len(), 1);
        manager.shutdown();
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let (manager, _source, _cores) = manager();
        let id = IndexId::new("idx");
        manager
            .create_index_with_id(id.clone(), config("articles", V1))
            .unwrap();
        assert!(matches!(
            manager.create_index_with_id(id, config("other", V1)),
            Err(IndexError::InvalidArgument(_))
        ));
        assert_eq!(manager.ids().len(), 1);
        manager.shutdown();
    }

    #[test]
    fn unknown_source_is_a_configuration_error() {
        let (manager, _source, cores) = manager();
        let result = manager.create_index(config("articles", V1).with_source_name("files"));
        assert!(matches!(
            result,
            Err(IndexError::Configuration { property, .. }) if property == keys::SOURCE_NAME
        ));
        assert!(cores.core_names().is_empty());
        assert!(manager.ids().is_empty());
    }

    #[test]
    fn reconfigure_reindexes_changed_program() {
        let (manager, _source, cores) = manager();
        let index = manager.create_index(config("articles", V1)).unwrap();
        index.poll_now().unwrap();
        let id = index.id().clone();

        let index = manager.reconfigure(&id, config("articles", V2)).unwrap();
        index.await_reindex();
        assert_eq!(index.state(), IndexState::Active);
        assert!(index.field_names().unwrap().unwrap().contains(&"subject".to_string()));
        assert_eq!(cores.core_names(), vec!["articles"]);
        assert_eq!(index.num_docs().unwrap(), 1);
        manager.shutdown();
    }

    #[test]
    fn failed_reconfigure_restores_previous() {
        let (manager, _source, _cores) = manager();
        let index = manager.create_index(config("articles", V1)).unwrap();
        let id = index.id().clone();

        let broken = config("articles", "title = dc:title :: nope ;");
        assert!(matches!(
            manager.reconfigure(&id, broken),
            Err(IndexError::Program { .. })
        ));
        let index = manager.get(&id).unwrap();
        assert_eq!(index.config().program, V1);
        assert_eq!(index.state(), IndexState::Active);
        manager.shutdown();
    }

    #[test]
    fn reconfigure_cannot_rename() {
        let (manager, _source, _cores) = manager();
        let index = manager.create_index(config("articles", V1)).unwrap();
        assert!(matches!(
            manager.reconfigure(index.id(), config("renamed", V1)),
            Err(IndexError::Configuration { .. })
        ));
        assert!(matches!(
            manager.reconfigure(&IndexId::new("missing"), config("x", V1)),
            Err(IndexError::NotFound(_))
        ));
        manager.shutdown();
    }

    #[test]
    fn remove_deletes_core_and_metadata() {
        let source = Arc::new(MemorySource::new("default"));
        let cores = Arc::new(MemoryCoreManager::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let manager = SemanticIndexManager::new(cores.clone(), metadata.clone());
        manager.register_source(source);

        let index = manager.create_index(config("articles", V1)).unwrap();
        let id = index.id().clone();
        manager.remove_index(&id).unwrap();

        assert!(manager.get(&id).is_none());
        assert!(!cores.is_managed_core("articles"));
        assert!(metadata.is_empty());
        assert!(matches!(
            manager.remove_index(&id),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn restore_after_restart() {
        let source = Arc::new(MemorySource::new("default"));
        source.put(Entity::new("urn:1").with_property("dc:title", "first"));
        let cores = Arc::new(MemoryCoreManager::new());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let first = SemanticIndexManager::new(cores.clone(), metadata.clone());
        first.register_source(source.clone());
        let index = first.create_index(config("articles", V1)).unwrap();
        index.poll_now().unwrap();
        let id = index.id().clone();
        let revision = index.revision();
        drop(index);
        first.shutdown();

        let second = SemanticIndexManager::new(cores.clone(), metadata);
        second.register_source(source);
        assert_eq!(second.restore().unwrap(), vec![id.clone()]);
        let index = second.get(&id).unwrap();
        assert_eq!(index.revision(), revision);
        assert_eq!(index.num_docs().unwrap(), 1);
        assert_eq!(cores.created_count(), 1);
        second.shutdown();
    }
}
