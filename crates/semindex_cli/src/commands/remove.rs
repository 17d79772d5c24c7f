//! Remove command implementation.

use super::open_store;
use semindex_storage::MetadataStore;
use std::path::Path;
use tracing::info;

/// Runs the remove command.
///
/// Only the metadata record is deleted; the index core belongs to the core
/// manager and must be removed there.
pub fn run(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    println!("{}", remove_record(&store, id)?);
    Ok(())
}

fn remove_record(store: &dyn MetadataStore, id: &str) -> Result<String, Box<dyn std::error::Error>> {
    match store.delete(id)? {
        Some(properties) => {
            let name = properties.get("name").map(String::as_str).unwrap_or("?");
            info!("Removed index record {} ({})", id, name);
            Ok(format!(
                "Removed index record {id} ({name})\n\
                 The core '{name}' was not deleted; remove it through the core manager \
                 before creating an index with the same name."
            ))
        }
        None => Err(format!("No index record with id {id}").into()),
    }
}
