//! End-to-end index lifecycle scenarios.

use semindex_core::{
    CoreManager, FieldValue, IndexError, IndexId, IndexState, IndexingSource, Revision,
    SemanticIndexManager,
};
use semindex_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn manager_with(harness: &TestHarness, source: Arc<dyn IndexingSource>) -> SemanticIndexManager {
    let manager = SemanticIndexManager::new(harness.cores.clone(), harness.metadata.clone());
    manager.register_source(source);
    manager
}

#[test]
fn incremental_poll_applies_upserts_and_tombstones() {
    let harness = TestHarness::memory();
    harness.source.put(article("urn:b", "to be deleted"));
    let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
    settle(&index);
    let before = index.revision();
    assert_eq!(before, Some(Revision(0)));

    let r1 = harness.source.put(article("urn:a", "fresh"));
    let r2 = harness.source.delete("urn:b");
    assert!(r1 < r2);

    let report = index.poll_now().unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.removed, 1);
    assert_eq!(report.revision, Some(r2));

    assert!(index.document("urn:a").unwrap().is_some());
    assert!(index.document("urn:b").unwrap().is_none());
    assert_eq!(harness.metadata_of("idx").unwrap().revision, Some(r2));
    assert_eq!(index.revision(), Some(r2));
    index.deactivate().unwrap();
}

#[test]
fn program_change_rebuilds_in_temporary_core() {
    let harness = TestHarness::memory();
    for entity in ten_articles() {
        harness
            .source
            .put(entity.with_property("dc:creator", "someone"));
    }
    let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
    settle(&index);
    index.deactivate().unwrap();
    assert!(harness.documents(INDEX_NAME)["urn:article:3"]
        .field("author")
        .is_empty());

    let index = harness.activate("idx", harness.config(TITLE_AUTHOR_PROGRAM));
    assert_eq!(index.state(), IndexState::Reindexing);
    index.await_reindex();

    assert_eq!(index.state(), IndexState::Active);
    assert!(!harness.cores.is_managed_core("articles-1"));
    assert_eq!(harness.cores.core_names(), vec![INDEX_NAME.to_string()]);
    assert_eq!(harness.cores.swap_count(), 1);

    let docs = harness.documents(INDEX_NAME);
    assert_eq!(docs.len(), 10);
    assert_eq!(
        docs["urn:article:3"].field("author"),
        &[FieldValue::Text("someone".into())]
    );

    let meta = harness.metadata_of("idx").unwrap();
    assert_eq!(meta.state, IndexState::Active);
    assert_eq!(meta.program_fingerprint, index.fingerprint());
    assert_eq!(meta.revision, harness.source.head());
    index.deactivate().unwrap();
}

#[test]
fn replay_failure_keeps_original_core_serving() {
    let harness = TestHarness::memory();
    for entity in ten_articles() {
        harness.source.put(entity);
    }
    let failing = Arc::new(FailingSource::new(harness.source.clone()));
    let manager = manager_with(&harness, failing.clone());
    let id = IndexId::new("idx");

    let index = manager
        .create_index_with_id(id.clone(), harness.config(TITLE_PROGRAM).with_batch_size(10))
        .unwrap();
    settle(&index);
    assert_eq!(index.num_docs().unwrap(), 10);

    failing.fail_nth_get(5);
    let index = manager
        .reconfigure(&id, harness.config(TITLE_AUTHOR_PROGRAM).with_batch_size(10))
        .unwrap();
    index.await_reindex();

    assert_eq!(index.state(), IndexState::Reindexing);
    assert!(!harness.cores.is_managed_core("articles-1"));
    assert_eq!(harness.cores.core_names(), vec![INDEX_NAME.to_string()]);
    assert_eq!(index.num_docs().unwrap(), 10);
    assert_eq!(index.search("article").unwrap().len(), 10);
    assert_eq!(index.stats().reindexes_failed, 1);
    assert_eq!(
        harness.metadata_of("idx").unwrap().state,
        IndexState::Reindexing
    );
    assert!(matches!(
        index.remove("urn:article:0"),
        Err(IndexError::MutationRejected { .. })
    ));

    // A new activation retries the reindex and succeeds.
    let index = manager
        .reconfigure(&id, harness.config(TITLE_AUTHOR_PROGRAM).with_batch_size(10))
        .unwrap();
    index.await_reindex();
    assert_eq!(index.state(), IndexState::Active);
    manager.shutdown();
}

#[test]
fn writes_rejected_while_reindexing() {
    let harness = TestHarness::memory();
    for entity in ten_articles() {
        harness.source.put(entity);
    }
    let gated = Arc::new(GatedSource::new(harness.source.clone()));
    let manager = manager_with(&harness, gated.clone());
    let id = IndexId::new("idx");

    let index = manager
        .create_index_with_id(id.clone(), harness.config(TITLE_PROGRAM))
        .unwrap();
    settle(&index);

    gated.close();
    let index = manager
        .reconfigure(&id, harness.config(TITLE_AUTHOR_PROGRAM))
        .unwrap();
    assert!(gated.wait_blocked(Duration::from_secs(5)));
    assert_eq!(index.state(), IndexState::Reindexing);
    assert!(index.is_reindex_running());

    let err = index.remove("urn:article:4").unwrap_err();
    assert!(matches!(err, IndexError::MutationRejected { .. }));
    assert_eq!(
        err.to_string(),
        "the index 'articles' is read-only as it is in reindexing state"
    );
    assert!(matches!(
        index.index(&article("urn:new", "new")),
        Err(IndexError::MutationRejected { .. })
    ));
    // Reads are served by the original core meanwhile.
    assert!(index.document("urn:article:4").unwrap().is_some());
    assert_eq!(index.num_docs().unwrap(), 10);

    assert!(matches!(
        manager.reconfigure(&id, harness.config(TITLE_PROGRAM)),
        Err(IndexError::ReindexInProgress { .. })
    ));

    gated.open();
    index.await_reindex();
    assert_eq!(index.state(), IndexState::Active);
    index.remove("urn:article:4").unwrap();
    assert!(index.document("urn:article:4").unwrap().is_none());
    manager.shutdown();
}

#[test]
fn epoch_reset_triggers_reindex() {
    let harness = TestHarness::memory();
    for entity in ten_articles() {
        harness.source.put(entity);
    }
    let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
    settle(&index);
    assert_eq!(index.epoch().0, 1);

    harness.source.delete("urn:article:9");
    let epoch = harness.source.reset_epoch();
    let report = index.poll_now().unwrap();
    assert!(report.epoch_changed);
    index.await_reindex();

    assert_eq!(index.state(), IndexState::Active);
    assert_eq!(index.epoch(), epoch);
    assert_eq!(index.revision(), harness.source.head());
    assert_eq!(index.num_docs().unwrap(), 9);
    let meta = harness.metadata_of("idx").unwrap();
    assert_eq!(meta.epoch, epoch);
    assert_eq!(meta.state, IndexState::Active);
    index.deactivate().unwrap();
}

#[test]
fn restore_after_restart_resumes_from_checkpoint() {
    let harness = TestHarness::file();
    for entity in ten_articles() {
        harness.source.put(entity);
    }
    let id = IndexId::new("idx");
    {
        let manager = harness.manager();
        let index = manager
            .create_index_with_id(id.clone(), harness.config(TITLE_PROGRAM))
            .unwrap();
        settle(&index);
        manager.shutdown();
    }
    harness.source.put(article("urn:late", "late arrival"));

    let manager = harness.manager();
    assert_eq!(manager.restore().unwrap(), vec![id.clone()]);
    let index = manager.get(&id).unwrap();
    assert_eq!(index.state(), IndexState::Active);
    settle(&index);

    assert_eq!(index.num_docs().unwrap(), 11);
    assert_eq!(index.revision(), harness.source.head());
    // Only the new change was polled after the restart.
    assert_eq!(index.stats().documents_indexed, 1);
    manager.shutdown();
}

#[test]
fn remove_index_purges_core_and_metadata() {
    let harness = TestHarness::memory();
    harness.source.put(article("urn:a", "a"));
    let manager = harness.manager();
    let index = manager
        .create_index(harness.config(TITLE_PROGRAM))
        .unwrap();
    let id = index.id().clone();
    settle(&index);

    manager.remove_index(&id).unwrap();
    assert!(!harness.cores.is_managed_core(INDEX_NAME));
    assert!(harness.metadata_of(id.as_str()).is_none());
    assert!(matches!(
        index.index(&article("urn:b", "b")),
        Err(IndexError::Deactivated { .. })
    ));
    assert!(matches!(
        manager.remove_index(&id),
        Err(IndexError::NotFound(_))
    ));
}

#[test]
fn concurrent_feed_converges() {
    let harness = TestHarness::memory();
    let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
    settle(&index);

    let config = StressConfig {
        operations: 100,
        threads: 4,
        entity_count: 20,
    };
    let result = concurrent_feed_and_poll(&index, &harness.source, &config);
    result.print_summary("feed and poll");
    assert_eq!(result.failed_ops, 0);

    assert_eq!(index.revision(), harness.source.head());
    let expected: Vec<String> = harness
        .source
        .entities()
        .into_iter()
        .map(|e| e.id)
        .collect();
    let indexed: Vec<String> = harness.documents(INDEX_NAME).into_keys().collect();
    assert_eq!(indexed, expected);
    index.deactivate().unwrap();
}

#[test]
fn concurrent_direct_writes() {
    let harness = TestHarness::memory();
    let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
    settle(&index);

    let result = concurrent_writes(&index, &StressConfig::default());
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.total_ops, 800);
    assert!(index.num_docs().unwrap() <= 50);
    index.deactivate().unwrap();
}
