//! Core types for SemIndex.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Configuration identity of an index.
///
/// This is the key under which metadata is persisted and the configuration
/// is registered. It is distinct from the index name, which names the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexId(String);

impl IndexId {
    /// Creates an id from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndexId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Generation counter of an indexing source.
///
/// Changes when the source's own history is reset or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic cursor within one epoch.
///
/// An index that has applied nothing yet holds `Option<Revision>::None`,
/// which orders before every revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexState {
    /// Readable and writable; the incremental poller is running.
    Active,
    /// Read-only for mutation; a background reindex is (or was) in progress.
    Reindexing,
}

impl IndexState {
    /// Returns true if `index`/`remove` are accepted in this state.
    #[must_use]
    pub fn accepts_writes(&self) -> bool {
        matches!(self, IndexState::Active)
    }

    /// Returns the persisted name of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Active => "ACTIVE",
            IndexState::Reindexing => "REINDEXING",
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(IndexState::Active),
            "REINDEXING" => Ok(IndexState::Reindexing),
            other => Err(format!("unknown index state: {other}")),
        }
    }
}

/// A source item to be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Source identifier; becomes the document id.
    pub id: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// Plain content, if the item has any.
    pub content: Option<String>,
    /// Property name to values.
    pub properties: BTreeMap<String, Vec<String>>,
}

impl Entity {
    /// Creates an entity without content or properties.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: "text/plain".into(),
            content: None,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property value.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the content and its MIME type.
    #[must_use]
    pub fn with_content(mut self, mime_type: impl Into<String>, content: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self.content = Some(content.into());
        self
    }
}

/// A single typed field value of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value (`string` and `text` fields).
    Text(String),
    /// Integer value (`int` and `long` fields).
    Integer(i64),
    /// Floating point value (`float` and `double` fields).
    Float(f64),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Returns the text if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// The representation of an entity submitted to a search core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document id (the source identifier).
    pub id: String,
    /// Field name to values.
    pub fields: BTreeMap<String, Vec<FieldValue>>,
}

impl Document {
    /// Creates an empty document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Appends a value to a field.
    pub fn add_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.entry(name.into()).or_default().push(value);
    }

    /// Returns the values of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> &[FieldValue] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// An ordered batch of changed entity ids.
///
/// The batch covers the changes after `from` up to `to_revision`. An empty
/// batch means the caller has caught up; its `to_revision` equals `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Epoch the changes belong to.
    pub epoch: Epoch,
    /// Revision the batch starts after.
    pub from: Option<Revision>,
    /// Changed ids in non-decreasing revision order.
    pub ids: Vec<String>,
    /// High-water mark after this batch.
    pub to_revision: Option<Revision>,
}

impl ChangeSet {
    /// Creates an empty (caught up) change set.
    #[must_use]
    pub fn empty(epoch: Epoch, from: Option<Revision>) -> Self {
        Self {
            epoch,
            from,
            ids: Vec::new(),
            to_revision: from,
        }
    }

    /// Returns true if the batch carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the number of changed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Iterates the changed ids in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Returns the new high-water mark.
    #[must_use]
    pub fn to_revision(&self) -> Option<Revision> {
        self.to_revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_state_round_trips_names() {
        for state in [IndexState::Active, IndexState::Reindexing] {
            assert_eq!(state.as_str().parse::<IndexState>().unwrap(), state);
        }
        assert!("INDEXING".parse::<IndexState>().is_err());
    }

    #[test]
    fn only_active_accepts_writes() {
        assert!(IndexState::Active.accepts_writes());
        assert!(!IndexState::Reindexing.accepts_writes());
    }

    #[test]
    fn unset_revision_orders_first() {
        assert!(None < Some(Revision(0)));
        assert!(Some(Revision(1)) < Some(Revision(2)));
    }

    #[test]
    fn empty_change_set_keeps_cursor() {
        let cs = ChangeSet::empty(Epoch(3), Some(Revision(7)));
        assert!(cs.is_empty());
        assert_eq!(cs.to_revision(), Some(Revision(7)));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(IndexId::generate(), IndexId::generate());
    }

    #[test]
    fn entity_builder_collects_values() {
        let entity = Entity::new("a")
            .with_property("dc:creator", "x")
            .with_property("dc:creator", "y")
            .with_content("text/html", "<p>hi</p>");
        assert_eq!(entity.properties["dc:creator"], vec!["x", "y"]);
        assert_eq!(entity.mime_type, "text/html");
    }
}
