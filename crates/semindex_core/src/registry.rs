//! Configuration registry.

use crate::config::IndexConfig;
use crate::types::IndexId;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Tells an index whether its configuration still exists.
///
/// A deactivating index whose id is no longer configured was removed, so it
/// deletes its core and metadata. Otherwise it was only stopped.
pub trait ConfigurationRegistry: Send + Sync {
    /// Returns true if `id` is configured.
    fn is_configured(&self, id: &IndexId) -> bool;
}

/// Map of the configured indexes.
#[derive(Debug, Default)]
pub struct Configurations {
    entries: RwLock<BTreeMap<IndexId, IndexConfig>>,
}

impl Configurations {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a configuration.
    pub fn insert(&self, id: IndexId, config: IndexConfig) -> Option<IndexConfig> {
        self.entries.write().insert(id, config)
    }

    /// Unregisters a configuration.
    pub fn remove(&self, id: &IndexId) -> Option<IndexConfig> {
        self.entries.write().remove(id)
    }

    /// Returns the configuration of `id`.
    #[must_use]
    pub fn get(&self, id: &IndexId) -> Option<IndexConfig> {
        self.entries.read().get(id).cloned()
    }

    /// Returns the id configured under an index name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<IndexId> {
        self.entries
            .read()
            .iter()
            .find(|(_, config)| config.name == name)
            .map(|(id, _)| id.clone())
    }

    /// Returns all configured ids.
    #[must_use]
    pub fn ids(&self) -> Vec<IndexId> {
        self.entries.read().keys().cloned().collect()
    }
}

impl ConfigurationRegistry for Configurations {
    fn is_configured(&self, id: &IndexId) -> bool {
        self.entries.read().contains_key(id)
    }
}
