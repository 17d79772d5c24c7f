//! Error types for SemIndex core.

use crate::types::Epoch;
use std::time::Duration;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors reported by an [`crate::IndexingSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source cannot be reached right now.
    #[error("indexing source unavailable: {0}")]
    Unavailable(String),

    /// Changes were requested for an epoch the source no longer serves.
    #[error("epoch mismatch: requested {requested}, active {active}")]
    EpochMismatch {
        /// Epoch the caller asked for.
        requested: Epoch,
        /// Epoch the source currently serves.
        active: Epoch,
    },

    /// A single entity could not be read.
    #[error("failed to read entity {id}: {message}")]
    Entity {
        /// Entity id.
        id: String,
        /// Description of the failure.
        message: String,
    },
}

/// Errors reported by a [`crate::CoreManager`] or [`crate::CoreHandle`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// No core is managed under the given name.
    #[error("core not found: {name}")]
    NotFound {
        /// Physical core name.
        name: String,
    },

    /// A core with the given name is already managed.
    #[error("core already exists: {name}")]
    AlreadyExists {
        /// Physical core name.
        name: String,
    },

    /// The core could not be created from the given schema.
    #[error("failed to create core {name}: {message}")]
    Creation {
        /// Physical core name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The core rejected a request.
    #[error("core request failed: {0}")]
    Request(String),
}

/// Errors that can occur in SemIndex operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A required setting is missing or invalid.
    #[error("configuration error in {property}: {message}")]
    Configuration {
        /// The offending property.
        property: String,
        /// Description of the problem.
        message: String,
    },

    /// The backing core could not be reached within the configured timeout.
    #[error("index core {core} unavailable after waiting {waited:?}")]
    Unavailable {
        /// Physical core name.
        core: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A write was attempted while the index is reindexing.
    #[error("the index '{name}' is read-only as it is in reindexing state")]
    MutationRejected {
        /// Index name.
        name: String,
    },

    /// A full reindex failed and was aborted.
    #[error("reindexing of '{name}' failed: {reason}")]
    ReplayFailure {
        /// Index name.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// A reindex is still running; the request must wait for it.
    #[error("reindexing of '{name}' is in progress")]
    ReindexInProgress {
        /// Index name.
        name: String,
    },

    /// The index instance was deactivated and no longer accepts requests.
    #[error("the index '{name}' has been deactivated")]
    Deactivated {
        /// Index name.
        name: String,
    },

    /// A poller or reindexer thread could not be started.
    #[error("failed to start worker thread: {0}")]
    Worker(std::io::Error),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A field program could not be parsed.
    #[error("field program error at definition {definition}: {message}")]
    Program {
        /// 1-based number of the offending definition.
        definition: usize,
        /// Description of the problem.
        message: String,
    },

    /// An entity value could not be converted to its field type.
    #[error("cannot extract field {field} of {id}: {message}")]
    Extraction {
        /// Entity id.
        id: String,
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// Persisted metadata is missing keys or holds malformed values.
    #[error("invalid index metadata: {0}")]
    Metadata(String),

    /// No index is registered under the given id or name.
    #[error("index not found: {0}")]
    NotFound(String),

    /// An index with the given name already exists.
    #[error("there is already an index with the name: {name}")]
    AlreadyExists {
        /// Index name.
        name: String,
    },

    /// Indexing source error.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Search core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Metadata storage error.
    #[error("storage error: {0}")]
    Storage(#[from] semindex_storage::StorageError),
}

impl IndexError {
    /// Creates a configuration error.
    pub fn configuration(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Returns true if the poller may succeed by retrying on its next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexError::Unavailable { .. } => true,
            IndexError::Source(SourceError::Unavailable(_)) => true,
            IndexError::Source(SourceError::Entity { .. }) => true,
            IndexError::Core(CoreError::Request(_)) => true,
            IndexError::Storage(semindex_storage::StorageError::Io(_)) => true,
            _ => false,
        }
    }
}
