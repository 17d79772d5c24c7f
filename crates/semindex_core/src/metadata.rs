//! Persisted index metadata.
//!
//! Metadata records are flat property maps in a [`MetadataStore`]; this
//! module owns their keys and the typed view over them.

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::types::{Epoch, IndexId, IndexState, Revision};
use semindex_storage::{MetadataStore, Properties};
use std::str::FromStr;

/// Property keys of a metadata record.
pub mod keys {
    /// Index name.
    pub const NAME: &str = "name";
    /// Description.
    pub const DESCRIPTION: &str = "description";
    /// Field program text.
    pub const PROGRAM: &str = "program";
    /// Fingerprint of the normalized field program.
    pub const PROGRAM_FINGERPRINT: &str = "program.fingerprint";
    /// Content indexing flag.
    pub const INDEX_CONTENT: &str = "index.content";
    /// Batch size.
    pub const BATCH_SIZE: &str = "batch.size";
    /// Indexing source name.
    pub const SOURCE_NAME: &str = "source.name";
    /// Poll period in milliseconds.
    pub const CHECK_PERIOD_MS: &str = "check.period.ms";
    /// Core availability timeout in milliseconds.
    pub const CORE_TIMEOUT_MS: &str = "core.timeout.ms";
    /// Ranking.
    pub const RANKING: &str = "ranking";
    /// Source epoch.
    pub const EPOCH: &str = "epoch";
    /// Last applied revision; absent while unset.
    pub const REVISION: &str = "revision";
    /// Lifecycle state.
    pub const STATE: &str = "state";
}

/// Typed view of a persisted metadata record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    /// Configuration the index was last activated with.
    pub config: IndexConfig,
    /// Fingerprint of the program the current core was built from.
    pub program_fingerprint: String,
    /// Source epoch.
    pub epoch: Epoch,
    /// Last applied revision.
    pub revision: Option<Revision>,
    /// Lifecycle state.
    pub state: IndexState,
}

impl IndexMetadata {
    /// Encodes the metadata as a property record.
    #[must_use]
    pub fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();
        self.config.write_properties(&mut properties);
        properties.insert(
            keys::PROGRAM_FINGERPRINT.into(),
            self.program_fingerprint.clone(),
        );
        properties.insert(keys::EPOCH.into(), self.epoch.0.to_string());
        if let Some(revision) = self.revision {
            properties.insert(keys::REVISION.into(), revision.0.to_string());
        }
        properties.insert(keys::STATE.into(), self.state.as_str().into());
        properties
    }

    /// Decodes a property record.
    pub fn from_properties(properties: &Properties) -> IndexResult<Self> {
        let config = IndexConfig::from_properties(properties)
            .map_err(|e| IndexError::Metadata(e.to_string()))?;
        let program_fingerprint = properties
            .get(keys::PROGRAM_FINGERPRINT)
            .cloned()
            .unwrap_or_default();
        let epoch = Epoch(parse(properties, keys::EPOCH)?);
        let revision = match properties.get(keys::REVISION) {
            Some(_) => Some(Revision(parse(properties, keys::REVISION)?)),
            None => None,
        };
        let state = properties
            .get(keys::STATE)
            .ok_or_else(|| IndexError::Metadata(format!("missing key {}", keys::STATE)))?
            .parse::<IndexState>()
            .map_err(IndexError::Metadata)?;

        Ok(Self {
            config,
            program_fingerprint,
            epoch,
            revision,
            state,
        })
    }

    /// Loads the record of `id`, if any.
    pub fn load(store: &dyn MetadataStore, id: &IndexId) -> IndexResult<Option<Self>> {
        store
            .get(id.as_str())?
            .map(|properties| Self::from_properties(&properties))
            .transpose()
    }

    /// Persists the record of `id`.
    pub fn save(&self, store: &dyn MetadataStore, id: &IndexId) -> IndexResult<()> {
        store.put(id.as_str(), &self.to_properties())?;
        Ok(())
    }
}

fn parse<T: FromStr>(properties: &Properties, key: &str) -> IndexResult<T> {
    let raw = properties
        .get(key)
        .ok_or_else(|| IndexError::Metadata(format!("missing key {key}")))?;
    raw.parse()
        .map_err(|_| IndexError::Metadata(format!("invalid value {raw:?} for {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_storage::MemoryMetadataStore;

    fn sample() -> IndexMetadata {
        IndexMetadata {
            config: IndexConfig::new("articles", "title = dc:title :: text ;"),
            program_fingerprint: "abc".into(),
            epoch: Epoch(4),
            revision: Some(Revision(17)),
            state: IndexState::Active,
        }
    }

    #[test]
    fn save_and_load() {
        let store = MemoryMetadataStore::new();
        let id = IndexId::new("idx");
        sample().save(&store, &id).unwrap();
        assert_eq!(IndexMetadata::load(&store, &id).unwrap(), Some(sample()));
        assert_eq!(
            IndexMetadata::load(&store, &IndexId::new("other")).unwrap(),
            None
        );
    }

    #[test]
    fn unset_revision_is_omitted() {
        let mut meta = sample();
        meta.revision = None;
        let props = meta.to_properties();
        assert!(!props.contains_key(keys::REVISION));
        assert_eq!(IndexMetadata::from_properties(&props).unwrap().revision, None);
    }

    #[test]
    fn malformed_records_are_rejected() {
        let mut props = sample().to_properties();
        props.insert(keys::STATE.into(), "INDEXING".into());
        assert!(matches!(
            IndexMetadata::from_properties(&props),
            Err(IndexError::Metadata(_))
        ));

        let mut props = sample().to_properties();
        props.remove(keys::EPOCH);
        assert!(IndexMetadata::from_properties(&props).is_err());

        let mut props = sample().to_properties();
        props.remove(keys::NAME);
        assert!(matches!(
            IndexMetadata::from_properties(&props),
            Err(IndexError::Metadata(_))
        ));
    }
}
