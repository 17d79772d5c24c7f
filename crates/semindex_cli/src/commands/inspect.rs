//! Inspect command implementation.

use super::open_store;
use semindex_core::{IndexId, IndexMetadata};
use semindex_storage::MetadataStore;
use serde::Serialize;
use std::path::Path;

/// Metadata directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Metadata directory path.
    pub path: String,
    /// One entry per index record.
    pub indexes: Vec<IndexSummary>,
    /// Ids of records that could not be decoded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<String>,
}

/// Summary of one index record.
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    /// Index id.
    pub id: String,
    /// Index name.
    pub name: String,
    /// Lifecycle state.
    pub state: String,
    /// Indexing source name.
    pub source: String,
    /// Source epoch.
    pub epoch: u64,
    /// Last applied revision.
    pub revision: Option<u64>,
    /// Batch size.
    pub batch_size: u32,
    /// Field program fingerprint.
    pub fingerprint: String,
}

impl IndexSummary {
    fn new(id: &str, meta: &IndexMetadata) -> Self {
        Self {
            id: id.to_string(),
            name: meta.config.name.clone(),
            state: meta.state.to_string(),
            source: meta.config.source_name.clone(),
            epoch: meta.epoch.0,
            revision: meta.revision.map(|r| r.0),
            batch_size: meta.config.batch_size,
            fingerprint: meta.program_fingerprint.clone(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        indexes: Vec::new(),
        unreadable: Vec::new(),
    };
    for id in store.ids()? {
        match IndexMetadata::load(&store, &IndexId::new(id.as_str())) {
            Ok(Some(meta)) => result.indexes.push(IndexSummary::new(&id, &meta)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "unreadable index record");
                result.unreadable.push(id);
            }
        }
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("SemIndex Metadata Inspection");
    println!("============================");
    println!();
    println!("Path: {}", result.path);
    println!("Indexes: {}", result.indexes.len());

    for index in &result.indexes {
        println!();
        println!("[{}] {}", index.id, index.name);
        println!("  State:       {}", index.state);
        println!("  Source:      {}", index.source);
        println!("  Epoch:       {}", index.epoch);
        println!("  Revision:    {}", format_revision(index.revision));
        println!("  Batch size:  {}", index.batch_size);
        println!("  Fingerprint: {}", short(&index.fingerprint));
    }

    if !result.unreadable.is_empty() {
        println!();
        println!("Unreadable records:");
        for id in &result.unreadable {
            println!("  {}", id);
        }
    }
}

pub(crate) fn format_revision(revision: Option<u64>) -> String {
    revision.map_or_else(|| "unset".to_string(), |r| r.to_string())
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
