//! Property tests over random entity histories.

use proptest::prelude::*;
use semindex_core::{Document, IndexId, IndexState};
use semindex_testkit::prelude::*;
use std::collections::BTreeMap;

fn titles(docs: &BTreeMap<String, Document>) -> BTreeMap<String, String> {
    docs.iter()
        .map(|(id, doc)| {
            let title = doc
                .field("title")
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            (id.clone(), title)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Polling in batches of any size ends with the last write of each id.
    #[test]
    fn polling_converges_to_last_write(
        ops in history_strategy(40),
        batch_size in batch_size_strategy(),
    ) {
        let harness = TestHarness::memory();
        let index = harness.activate("idx", harness.config(TITLE_PROGRAM).with_batch_size(batch_size));
        settle(&index);

        apply_history(&harness.source, &ops);
        index.poll_now().unwrap();

        prop_assert_eq!(titles(&harness.documents(INDEX_NAME)), expected_titles(&ops));
        prop_assert_eq!(index.revision(), harness.source.head());
        index.deactivate().unwrap();
    }

    /// Direct writes to an active index follow last-write-wins too.
    #[test]
    fn direct_writes_are_last_write_wins(ops in history_strategy(40)) {
        let harness = TestHarness::memory();
        let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
        settle(&index);

        for op in &ops {
            match op {
                HistoryOp::Put { id, title } => {
                    prop_assert!(index.index(&article(id, title)).unwrap());
                }
                HistoryOp::Delete { id } => index.remove(id).unwrap(),
            }
        }

        prop_assert_eq!(titles(&harness.documents(INDEX_NAME)), expected_titles(&ops));
        index.deactivate().unwrap();
    }

    /// A reindex produces the same documents as incremental polling.
    #[test]
    fn reindex_matches_incremental_replay(
        ops in history_strategy(40),
        batch_size in batch_size_strategy(),
    ) {
        let harness = TestHarness::memory();
        let config = harness.config(TITLE_PROGRAM).with_batch_size(batch_size);
        let index = harness.activate("idx", config.clone());
        settle(&index);
        apply_history(&harness.source, &ops);
        index.poll_now().unwrap();
        let incremental = harness.documents(INDEX_NAME);
        index.deactivate().unwrap();

        let index = harness.activate("idx", config.with_program(TITLE_PROGRAM_OMIT_NORMS));
        index.await_reindex();
        prop_assert_eq!(index.state(), IndexState::Active);
        prop_assert_eq!(harness.documents(INDEX_NAME), incremental);
        prop_assert_eq!(index.revision(), harness.source.head());
        index.deactivate().unwrap();
    }

    /// Replaying batches after a lost checkpoint changes nothing.
    #[test]
    fn batch_replay_is_idempotent(ops in history_strategy(40)) {
        let harness = TestHarness::memory();
        let config = harness.config(TITLE_PROGRAM);
        let index = harness.activate("idx", config.clone());
        settle(&index);
        apply_history(&harness.source, &ops);
        index.poll_now().unwrap();
        let applied = harness.documents(INDEX_NAME);
        index.deactivate().unwrap();

        // Forget the checkpoint, as if the process died before persisting it.
        let mut meta = harness.metadata_of("idx").unwrap();
        meta.revision = None;
        meta.save(harness.metadata.as_ref(), &IndexId::new("idx")).unwrap();

        let index = harness.activate("idx", config);
        settle(&index);
        prop_assert_eq!(harness.documents(INDEX_NAME), applied);
        prop_assert_eq!(index.revision(), harness.source.head());
        index.deactivate().unwrap();
    }

    /// A poll that finds nothing new writes no metadata.
    #[test]
    fn empty_poll_does_not_persist(ops in history_strategy(20)) {
        let harness = TestHarness::memory();
        let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
        settle(&index);
        apply_history(&harness.source, &ops);
        index.poll_now().unwrap();

        let writes = harness.metadata_writes().unwrap();
        let revision = index.revision();
        let report = index.poll_now().unwrap();
        prop_assert_eq!(report.batches, 0);
        prop_assert_eq!(harness.metadata_writes().unwrap(), writes);
        prop_assert_eq!(index.revision(), revision);
        index.deactivate().unwrap();
    }
}
