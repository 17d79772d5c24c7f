//! Show command implementation.

use super::open_store;
use semindex_storage::MetadataStore;
use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let properties = store
        .get(id)?
        .ok_or_else(|| format!("No index record with id {id}"))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&properties)?);
        }
        _ => {
            println!("Index {id}");
            let width = properties.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in &properties {
                // Programs span lines; indent continuation lines under the value.
                let value = value.replace('\n', &format!("\n  {:width$}   ", ""));
                println!("  {key:width$} = {value}");
            }
        }
    }

    Ok(())
}
