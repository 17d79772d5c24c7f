//! # SemIndex Storage
//!
//! Index metadata store trait and implementations for SemIndex.
//!
//! This crate provides the lowest-level persistence abstraction for SemIndex.
//! Metadata stores are **opaque property stores** - they keep a flat
//! `String -> String` map per index id and do not interpret it.
//!
//! ## Design Principles
//!
//! - Stores are simple keyed records (get, put, delete, list)
//! - No knowledge of index states, epochs, or revisions
//! - Must be `Send + Sync` for concurrent access
//! - SemIndex owns all property interpretation
//!
//! ## Available Stores
//!
//! - [`MemoryMetadataStore`] - For testing and ephemeral indexes
//! - [`FileMetadataStore`] - One CBOR file per index in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use semindex_storage::{MemoryMetadataStore, MetadataStore, Properties};
//!
//! let store = MemoryMetadataStore::new();
//! let mut props = Properties::new();
//! props.insert("name".into(), "articles".into());
//! store.put("idx-1", &props).unwrap();
//! assert_eq!(store.get("idx-1").unwrap(), Some(props));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileMetadataStore;
pub use memory::MemoryMetadataStore;
pub use store::{MetadataStore, Properties};
