//! Metadata store trait definition.

use crate::error::StorageResult;
use std::collections::BTreeMap;

/// A flat property record persisted per index.
///
/// Ordered so that encoded records and printed output are deterministic.
pub type Properties = BTreeMap<String, String>;

/// A persistent store of index metadata records.
///
/// Records are keyed by the index id (the configuration identity, not the
/// index name). Stores never interpret the properties they hold.
///
/// # Invariants
///
/// - `get` returns exactly the properties of the last successful `put`
/// - `delete` returns the removed record, or `None` if there was none
/// - `put` replaces the whole record; it never merges
/// - Stores must be `Send + Sync`; indexes persist from background threads
///
/// # Implementors
///
/// - [`super::MemoryMetadataStore`] - For testing
/// - [`super::FileMetadataStore`] - For persistent storage
pub trait MetadataStore: Send + Sync {
    /// Returns the record stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or decoded.
    fn get(&self, id: &str) -> StorageResult<Option<Properties>>;

    /// Stores `properties` as the record for `id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not a valid key or the write fails.
    fn put(&self, id: &str, properties: &Properties) -> StorageResult<()>;

    /// Removes the record for `id` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    fn delete(&self, id: &str) -> StorageResult<Option<Properties>>;

    /// Lists the ids of all stored records, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn ids(&self) -> StorageResult<Vec<String>>;

    /// Returns true if a record exists for `id`.
    fn contains(&self, id: &str) -> StorageResult<bool> {
        Ok(self.get(id)?.is_some())
    }
}
