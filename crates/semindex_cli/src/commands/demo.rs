//! Demo command implementation.
//!
//! Runs the full index lifecycle against an in-memory source and core
//! manager: create, feed, poll, reconfigure, reindex and search. With a
//! path, index metadata is written to that directory so it can be looked at
//! with `inspect` afterwards.

use semindex_core::{
    Entity, IndexConfig, IndexState, MemoryCoreManager, MemorySource, SemanticIndexManager,
};
use semindex_storage::{FileMetadataStore, MemoryMetadataStore, MetadataStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PROGRAM_V1: &str = "\
# article fields
title  = dc:title :: text ;
author = dc:creator :: string ;
";

const PROGRAM_V2: &str = "\
# article fields, with subjects
title   = dc:title :: text ;
author  = dc:creator :: string ;
subject = dc:subject :: text ;
year    = dc:date :: int ;
";

const SUBJECTS: &[&str] = &["databases", "networking", "compilers", "storage"];

/// Runs the demo command.
pub fn run(path: Option<&Path>, documents: usize) -> Result<(), Box<dyn std::error::Error>> {
    let metadata: Arc<dyn MetadataStore> = match path {
        Some(path) => Arc::new(FileMetadataStore::open(path, true)?),
        None => Arc::new(MemoryMetadataStore::new()),
    };
    let source = Arc::new(MemorySource::new("default"));
    let cores = Arc::new(MemoryCoreManager::new());
    let manager = SemanticIndexManager::new(cores.clone(), metadata);
    manager.register_source(source.clone());

    for i in 0..documents {
        source.put(article(i));
    }

    let config = IndexConfig::new("articles", PROGRAM_V1)
        .with_description("demo articles")
        .with_batch_size(10)
        .with_check_period(Duration::from_secs(3600));
    let index = manager.create_index(config.clone())?;
    let report = index.poll_now()?;
    println!(
        "Indexed {} documents in {} batches (revision {})",
        report.indexed,
        report.batches,
        super::inspect::format_revision(report.revision.map(|r| r.0))
    );
    println!("Search 'rust': {} hits", index.search("rust")?.len());

    // Deletions reach the index as tombstones.
    if documents > 0 {
        source.delete("urn:article:0");
        index.poll_now()?;
        println!("After deleting one article: {} documents", index.num_docs()?);
    }

    info!("Reconfiguring with a new field program");
    let index = manager.reconfigure(index.id(), config.with_program(PROGRAM_V2))?;
    println!("State after reconfigure: {}", index.state());
    index.await_reindex();
    if index.state() != IndexState::Active {
        return Err(format!("reindex did not complete: {:?}", index.stats().last_error).into());
    }
    println!(
        "Reindex complete after {} core swap(s); fields: {}",
        cores.swap_count(),
        index.field_names()?.unwrap_or_default().join(", ")
    );
    for subject in SUBJECTS {
        println!(
            "Search 'subject:{subject}': {} hits",
            index.search(&format!("subject:{subject}"))?.len()
        );
    }

    let stats = index.stats();
    println!(
        "Stats: {} polls, {} batches, {} reindexes",
        stats.polls, stats.batches_applied, stats.reindexes_completed
    );

    manager.shutdown();
    Ok(())
}

fn article(i: usize) -> Entity {
    Entity::new(format!("urn:article:{i}"))
        .with_property("dc:title", format!("Rust article number {i}"))
        .with_property("dc:creator", format!("author-{}", i % 3))
        .with_property("dc:subject", SUBJECTS[i % SUBJECTS.len()])
        .with_property("dc:date", format!("{}", 2000 + i % 25))
        .with_content("text/plain", format!("Body of article {i}."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_in_memory() {
        run(None, 12).unwrap();
    }

    #[test]
    fn demo_writes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        run(Some(dir.path()), 5).unwrap();

        let store = FileMetadataStore::open(dir.path(), false).unwrap();
        assert_eq!(store.ids().unwrap().len(), 1);
    }
}
