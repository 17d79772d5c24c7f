//! Search core contracts.
//!
//! A core is a named physical search index. The logical index name always
//! names the live core; a reindex builds a temporary core next to it and
//! then swaps the two names.

use crate::error::CoreError;
use crate::program::CoreSchema;
use crate::types::Document;
use std::sync::Arc;
use std::time::Duration;

/// Creates, swaps and deletes named cores.
pub trait CoreManager: Send + Sync {
    /// Creates a core from a schema.
    fn create_core(&self, name: &str, schema: &CoreSchema)
        -> Result<Arc<dyn CoreHandle>, CoreError>;

    /// Atomically exchanges the cores behind two names.
    fn swap_cores(&self, logical: &str, temporary: &str) -> Result<(), CoreError>;

    /// Deletes a core; with `purge_data` its stored data is removed too.
    fn delete_core(&self, name: &str, purge_data: bool) -> Result<(), CoreError>;

    /// Returns true if a core with this name exists.
    fn is_managed_core(&self, name: &str) -> bool;

    /// Returns a handle to the core, waiting up to `wait` for it to become
    /// available.
    fn core_handle(&self, name: &str, wait: Duration) -> Option<Arc<dyn CoreHandle>>;
}

/// Read and write access to one core.
///
/// Adds and deletes become visible to reads only after [`commit`](Self::commit).
pub trait CoreHandle: Send + Sync {
    /// Adds or replaces a document.
    fn add(&self, document: Document) -> Result<(), CoreError>;

    /// Deletes the document with the given id, if present.
    fn delete_by_id(&self, id: &str) -> Result<(), CoreError>;

    /// Makes pending changes visible.
    fn commit(&self) -> Result<(), CoreError>;

    /// Returns the schema the core was created from.
    fn schema(&self) -> CoreSchema;

    /// Returns a committed document.
    fn document(&self, id: &str) -> Option<Document>;

    /// Returns the ids of committed documents matching a query.
    fn search(&self, query: &str) -> Result<Vec<String>, CoreError>;

    /// Returns the number of committed documents.
    fn num_docs(&self) -> usize;
}
