//! In-memory metadata store for testing.

use crate::error::StorageResult;
use crate::store::{MetadataStore, Properties};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory metadata store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral indexes that don't need to survive a restart
///
/// # Example
///
/// ```rust
/// use semindex_storage::{MemoryMetadataStore, MetadataStore, Properties};
///
/// let store = MemoryMetadataStore::new();
/// store.put("a", &Properties::new()).unwrap();
/// assert_eq!(store.ids().unwrap(), vec!["a".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<BTreeMap<String, Properties>>,
    writes: RwLock<u64>,
}

impl MemoryMetadataStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successful `put` calls so far.
    ///
    /// Useful for asserting that an operation did or did not persist.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.writes.read()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, id: &str) -> StorageResult<Option<Properties>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn put(&self, id: &str, properties: &Properties) -> StorageResult<()> {
        self.records
            .write()
            .insert(id.to_string(), properties.clone());
        *self.writes.write() += 1;
        Ok(())
    }

    fn delete(&self, id: &str) -> StorageResult<Option<Properties>> {
        Ok(self.records.write().remove(id))
    }

    fn ids(&self) -> StorageResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn put_replaces_whole_record() {
        let store = MemoryMetadataStore::new();
        store
            .put("idx", &props(&[("name", "a"), ("revision", "3")]))
            .unwrap();
        store.put("idx", &props(&[("name", "a")])).unwrap();

        let record = store.get("idx").unwrap().unwrap();
        assert_eq!(record.get("revision"), None);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn delete_returns_previous_record() {
        let store = MemoryMetadataStore::new();
        store.put("idx", &props(&[("name", "a")])).unwrap();

        let removed = store.delete("idx").unwrap();
        assert_eq!(removed, Some(props(&[("name", "a")])));
        assert_eq!(store.delete("idx").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_sorted() {
        let store = MemoryMetadataStore::new();
        for id in ["c", "a", "b"] {
            store.put(id, &Properties::new()).unwrap();
        }
        assert_eq!(store.ids().unwrap(), vec!["a", "b", "c"]);
        assert!(store.contains("b").unwrap());
        assert!(!store.contains("z").unwrap());
    }
}
