//! CLI command implementations.

pub mod demo;
pub mod inspect;
pub mod remove;
pub mod show;

use semindex_storage::FileMetadataStore;
use std::path::Path;

/// Opens an existing metadata directory.
fn open_store(path: &Path) -> Result<FileMetadataStore, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No metadata directory found at {:?}", path).into());
    }
    Ok(FileMetadataStore::open(path, false)?)
}
