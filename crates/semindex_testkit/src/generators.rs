//! Property-based test generators using proptest.
//!
//! Histories draw ids from a small pool so that updates and deletes of the
//! same entity are common.

use crate::fixtures::article;
use proptest::prelude::*;
use semindex_core::MemorySource;
use std::collections::BTreeMap;

/// Size of the id pool.
pub const ID_POOL: usize = 8;

/// A single change applied to a source or an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    /// Create or update an entity.
    Put {
        /// Entity id.
        id: String,
        /// Value of `dc:title`.
        title: String,
    },
    /// Delete an entity.
    Delete {
        /// Entity id.
        id: String,
    },
}

impl HistoryOp {
    /// The id this operation touches.
    pub fn id(&self) -> &str {
        match self {
            Self::Put { id, .. } | Self::Delete { id } => id,
        }
    }
}

/// Strategy for ids from the pool.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    (0..ID_POOL).prop_map(|i| format!("urn:entity:{i}"))
}

/// Strategy for short titles of lowercase words.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
        1..4,
    )
    .prop_map(|words| words.join(" "))
}

/// Strategy for a single operation; puts are three times as likely.
pub fn history_op_strategy() -> impl Strategy<Value = HistoryOp> {
    prop_oneof![
        3 => (entity_id_strategy(), title_strategy())
            .prop_map(|(id, title)| HistoryOp::Put { id, title }),
        1 => entity_id_strategy().prop_map(|id| HistoryOp::Delete { id }),
    ]
}

/// Strategy for histories of up to `max_len` operations.
pub fn history_strategy(max_len: usize) -> impl Strategy<Value = Vec<HistoryOp>> {
    prop::collection::vec(history_op_strategy(), 0..=max_len)
}

/// Strategy for batch sizes.
pub fn batch_size_strategy() -> impl Strategy<Value = u32> {
    1u32..=6
}

/// Applies `ops` to `source` in order.
pub fn apply_history(source: &MemorySource, ops: &[HistoryOp]) {
    for op in ops {
        match op {
            HistoryOp::Put { id, title } => {
                source.put(article(id, title));
            }
            HistoryOp::Delete { id } => {
                source.delete(id);
            }
        }
    }
}

/// Final title of each live id: the last write wins, a delete removes.
pub fn expected_titles(ops: &[HistoryOp]) -> BTreeMap<String, String> {
    let mut titles = BTreeMap::new();
    for op in ops {
        match op {
            HistoryOp::Put { id, title } => {
                titles.insert(id.clone(), title.clone());
            }
            HistoryOp::Delete { id } => {
                titles.remove(id);
            }
        }
    }
    titles
}
