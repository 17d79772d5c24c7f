//! Test fixtures and harnesses.
//!
//! A [`TestHarness`] owns one of everything an index needs: an in-memory
//! source, an in-memory core manager, a metadata store and a configuration
//! registry. Indexes activated through the harness get a long check period
//! so tests drive polling explicitly with `poll_now`.

use semindex_core::{
    Collaborators, Configurations, Document, Entity, IndexConfig, IndexId, IndexMetadata,
    IndexingSource, MemoryCoreManager, MemorySource, SemanticIndex, SemanticIndexManager,
};
use semindex_storage::{FileMetadataStore, MemoryMetadataStore, MetadataStore};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Name of the source every harness registers.
pub const SOURCE_NAME: &str = "default";

/// Name of the index [`TestHarness::config`] builds.
pub const INDEX_NAME: &str = "articles";

/// A program with a single text field read from `dc:title`.
pub const TITLE_PROGRAM: &str = "title = dc:title :: text ;";

/// Same documents as [`TITLE_PROGRAM`], different fingerprint.
pub const TITLE_PROGRAM_OMIT_NORMS: &str = r#"title = dc:title :: text [omitNorms="true"] ;"#;

/// Adds an `author` field to [`TITLE_PROGRAM`].
pub const TITLE_AUTHOR_PROGRAM: &str = "\
title  = dc:title :: text ;
author = dc:creator :: string ;
";

/// Wiring for a single test.
pub struct TestHarness {
    /// The indexing source.
    pub source: Arc<MemorySource>,
    /// The core manager.
    pub cores: Arc<MemoryCoreManager>,
    /// The metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// The configuration registry.
    pub registry: Arc<Configurations>,
    memory_store: Option<Arc<MemoryMetadataStore>>,
    temp_dir: Option<TempDir>,
}

impl TestHarness {
    /// Creates a harness with an in-memory metadata store.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryMetadataStore::new());
        Self {
            source: Arc::new(MemorySource::new(SOURCE_NAME)),
            cores: Arc::new(MemoryCoreManager::new()),
            metadata: store.clone(),
            registry: Arc::new(Configurations::new()),
            memory_store: Some(store),
            temp_dir: None,
        }
    }

    /// Creates a harness whose metadata lives in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store =
            FileMetadataStore::open(temp_dir.path(), true).expect("Failed to open metadata store");
        Self {
            source: Arc::new(MemorySource::new(SOURCE_NAME)),
            cores: Arc::new(MemoryCoreManager::new()),
            metadata: Arc::new(store),
            registry: Arc::new(Configurations::new()),
            memory_store: None,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the metadata directory of a file harness.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Number of metadata writes so far; only tracked by memory harnesses.
    pub fn metadata_writes(&self) -> Option<u64> {
        self.memory_store.as_ref().map(|s| s.write_count())
    }

    /// Collaborators reading from the harness source.
    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with(self.source.clone())
    }

    /// Collaborators reading from another source, e.g. a fault injector.
    pub fn collaborators_with(&self, source: Arc<dyn IndexingSource>) -> Collaborators {
        Collaborators {
            source,
            cores: self.cores.clone(),
            metadata: self.metadata.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Index configuration for tests: small batches, polling left to the test.
    pub fn config(&self, program: &str) -> IndexConfig {
        IndexConfig::new(INDEX_NAME, program)
            .with_batch_size(4)
            .with_check_period(Duration::from_secs(3600))
            .with_core_timeout(Duration::from_millis(50))
    }

    /// Registers and activates an index.
    pub fn activate(&self, id: &str, config: IndexConfig) -> Arc<SemanticIndex> {
        self.activate_with(id, config, self.source.clone())
    }

    /// Registers and activates an index reading from `source`.
    pub fn activate_with(
        &self,
        id: &str,
        config: IndexConfig,
        source: Arc<dyn IndexingSource>,
    ) -> Arc<SemanticIndex> {
        let id = IndexId::new(id);
        self.registry.insert(id.clone(), config.clone());
        SemanticIndex::activate(id, config, self.collaborators_with(source))
            .expect("Failed to activate index")
    }

    /// Creates a manager sharing this harness' cores and metadata.
    pub fn manager(&self) -> SemanticIndexManager {
        let manager = SemanticIndexManager::new(self.cores.clone(), self.metadata.clone());
        manager.register_source(self.source.clone());
        manager
    }

    /// Loads the persisted metadata of `id`.
    pub fn metadata_of(&self, id: &str) -> Option<IndexMetadata> {
        IndexMetadata::load(self.metadata.as_ref(), &IndexId::new(id))
            .expect("Failed to load index metadata")
    }

    /// Snapshot of every document in the core named `name`, by id.
    pub fn documents(&self, name: &str) -> BTreeMap<String, Document> {
        documents_of(&self.cores, name)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::memory()
    }
}

/// Snapshot of every document in the core named `name`, by id.
pub fn documents_of(cores: &MemoryCoreManager, name: &str) -> BTreeMap<String, Document> {
    let Some(core) = cores.core(name) else {
        return BTreeMap::new();
    };
    core.ids()
        .into_iter()
        .filter_map(|id| {
            semindex_core::CoreHandle::document(core.as_ref(), &id).map(|doc| (id, doc))
        })
        .collect()
}

/// An entity with a `dc:title`.
pub fn article(id: &str, title: &str) -> Entity {
    Entity::new(id).with_property("dc:title", title)
}

/// Ten articles `urn:article:0` .. `urn:article:9` titled `article <i>`.
pub fn ten_articles() -> Vec<Entity> {
    (0..10)
        .map(|i| article(&format!("urn:article:{i}"), &format!("article {i}")))
        .collect()
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Waits for the poller's first tick, then drains whatever is left.
///
/// Once this returns, the background poller is idle until its next period.
pub fn settle(index: &SemanticIndex) {
    assert!(
        wait_until(Duration::from_secs(5), || index.stats().polls >= 1),
        "poller never ticked"
    );
    index.poll_now().expect("Failed to poll");
}
