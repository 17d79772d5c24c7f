//! # SemIndex Core
//!
//! Semantic indexes that keep a search core in sync with a revisioned
//! indexing source.
//!
//! This crate provides:
//! - Field programs defining a core schema and the entity to document mapping
//! - The `ACTIVE` / `REINDEXING` index state machine
//! - Incremental polling with at-least-once revision checkpoints
//! - Background reindexing into a temporary core with an atomic swap
//! - A manager supervising the index lifecycle
//! - In-memory sources and cores for embedding and tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod core_manager;
mod error;
mod index;
mod manager;
mod memory_core;
mod metadata;
mod poller;
mod program;
mod registry;
mod reindex;
mod source;
mod stats;
mod types;

pub use config::{
    IndexConfig, DEFAULT_BATCH_SIZE, DEFAULT_CHECK_PERIOD, DEFAULT_CORE_TIMEOUT,
    DEFAULT_SOURCE_NAME,
};
pub use core_manager::{CoreHandle, CoreManager};
pub use error::{CoreError, IndexError, IndexResult, SourceError};
pub use index::{Collaborators, SemanticIndex};
pub use manager::SemanticIndexManager;
pub use memory_core::{tokenize, MemoryCore, MemoryCoreManager};
pub use metadata::{keys, IndexMetadata};
pub use poller::PollReport;
pub use program::{
    CoreSchema, FieldProgram, FieldSpec, FieldType, CONTENT_FIELD, ID_FIELD, SUPPORTED_MIME_TYPES,
};
pub use registry::{ConfigurationRegistry, Configurations};
pub use source::{IndexingSource, MemorySource};
pub use stats::{IndexStats, StatsSnapshot};
pub use types::{
    ChangeSet, Document, Entity, Epoch, FieldValue, IndexId, IndexState, Revision,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
