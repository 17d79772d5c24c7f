//! Configuration of a semantic index.

use crate::error::{IndexError, IndexResult};
use crate::metadata::keys;
use semindex_storage::Properties;
use std::str::FromStr;
use std::time::Duration;

/// Default number of changes processed per batch.
pub const DEFAULT_BATCH_SIZE: u32 = 10;
/// Default name of the indexing source.
pub const DEFAULT_SOURCE_NAME: &str = "default";
/// Default period between incremental polls.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(10);
/// Default time to wait for a core to become available.
pub const DEFAULT_CORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of one semantic index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Logical index name; also the name of its core.
    pub name: String,
    /// Free text description.
    pub description: String,
    /// Field program text defining schema and extraction.
    pub program: String,
    /// Whether plain text content of supported MIME types is indexed.
    pub index_content: bool,
    /// Maximum number of changes fetched per batch.
    pub batch_size: u32,
    /// Name of the indexing source to follow.
    pub source_name: String,
    /// Period between incremental polls.
    pub check_period: Duration,
    /// Maximum time to wait for the core handle.
    pub core_timeout: Duration,
    /// Priority among indexes with the same name.
    pub ranking: i32,
}

impl IndexConfig {
    /// Creates a configuration with default settings.
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            program: program.into(),
            index_content: true,
            batch_size: DEFAULT_BATCH_SIZE,
            source_name: DEFAULT_SOURCE_NAME.into(),
            check_period: DEFAULT_CHECK_PERIOD,
            core_timeout: DEFAULT_CORE_TIMEOUT,
            ranking: 0,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the field program.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets whether content is indexed.
    #[must_use]
    pub fn with_index_content(mut self, index_content: bool) -> Self {
        self.index_content = index_content;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the indexing source name.
    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    /// Sets the poll period.
    #[must_use]
    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Sets the core availability timeout.
    #[must_use]
    pub fn with_core_timeout(mut self, timeout: Duration) -> Self {
        self.core_timeout = timeout;
        self
    }

    /// Sets the ranking.
    #[must_use]
    pub fn with_ranking(mut self, ranking: i32) -> Self {
        self.ranking = ranking;
        self
    }

    /// Checks that every required setting is present and in range.
    pub fn validate(&self) -> IndexResult<()> {
        if self.name.trim().is_empty() {
            return Err(IndexError::configuration(keys::NAME, "index name cannot be empty"));
        }
        if self.program.trim().is_empty() {
            return Err(IndexError::configuration(
                keys::PROGRAM,
                "field program cannot be empty",
            ));
        }
        if self.batch_size == 0 {
            return Err(IndexError::configuration(
                keys::BATCH_SIZE,
                "batch size must be positive",
            ));
        }
        if self.check_period.is_zero() {
            return Err(IndexError::configuration(
                keys::CHECK_PERIOD_MS,
                "check period must be positive",
            ));
        }
        if self.source_name.is_empty() {
            return Err(IndexError::configuration(
                keys::SOURCE_NAME,
                "indexing source name cannot be empty",
            ));
        }
        Ok(())
    }

    /// Reads a configuration from a property map.
    ///
    /// `name` and `program` are required; every other key falls back to its
    /// default when absent.
    pub fn from_properties(properties: &Properties) -> IndexResult<Self> {
        let name = required(properties, keys::NAME)?;
        let program = required(properties, keys::PROGRAM)?;
        let mut config = Self::new(name, program);

        if let Some(description) = properties.get(keys::DESCRIPTION) {
            config.description = description.clone();
        }
        if let Some(source) = properties.get(keys::SOURCE_NAME) {
            config.source_name = source.clone();
        }
        config.index_content = optional(properties, keys::INDEX_CONTENT, config.index_content)?;
        config.batch_size = optional(properties, keys::BATCH_SIZE, config.batch_size)?;
        config.ranking = optional(properties, keys::RANKING, config.ranking)?;
        config.check_period = Duration::from_millis(optional(
            properties,
            keys::CHECK_PERIOD_MS,
            config.check_period.as_millis() as u64,
        )?);
        config.core_timeout = Duration::from_millis(optional(
            properties,
            keys::CORE_TIMEOUT_MS,
            config.core_timeout.as_millis() as u64,
        )?);

        Ok(config)
    }

    /// Writes the configuration keys into a property map.
    pub fn write_properties(&self, properties: &mut Properties) {
        properties.insert(keys::NAME.into(), self.name.clone());
        properties.insert(keys::DESCRIPTION.into(), self.description.clone());
        properties.insert(keys::PROGRAM.into(), self.program.clone());
        properties.insert(keys::INDEX_CONTENT.into(), self.index_content.to_string());
        properties.insert(keys::BATCH_SIZE.into(), self.batch_size.to_string());
        properties.insert(keys::SOURCE_NAME.into(), self.source_name.clone());
        properties.insert(
            keys::CHECK_PERIOD_MS.into(),
            self.check_period.as_millis().to_string(),
        );
        properties.insert(
            keys::CORE_TIMEOUT_MS.into(),
            self.core_timeout.as_millis().to_string(),
        );
        properties.insert(keys::RANKING.into(), self.ranking.to_string());
    }
}

fn required(properties: &Properties, key: &str) -> IndexResult<String> {
    match properties.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(IndexError::configuration(key, "required property is missing")),
    }
}

fn optional<T: FromStr>(properties: &Properties, key: &str, default: T) -> IndexResult<T> {
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IndexError::configuration(key, format!("invalid value {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_factory_values() {
        let config = IndexConfig::new("articles", "title = dc:title :: text ;");
        assert_eq!(config.batch_size, 10);
        assert!(config.index_content);
        assert_eq!(config.check_period, Duration::from_secs(10));
        assert_eq!(config.core_timeout, Duration::from_secs(5));
        assert_eq!(config.description, "");
        assert_eq!(config.ranking, 0);
        config.validate().unwrap();
    }

    #[test]
    fn config_builder() {
        let config = IndexConfig::new("a", "p")
            .with_batch_size(50)
            .with_check_period(Duration::from_millis(250))
            .with_source_name("files")
            .with_index_content(false);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.check_period, Duration::from_millis(250));
        assert_eq!(config.source_name, "files");
        assert!(!config.index_content);
    }

    #[test]
    fn validate_rejects_missing_settings() {
        let cases = [
            (IndexConfig::new("", "p"), keys::NAME),
            (IndexConfig::new("a", "  "), keys::PROGRAM),
            (IndexConfig::new("a", "p").with_batch_size(0), keys::BATCH_SIZE),
            (
                IndexConfig::new("a", "p").with_check_period(Duration::ZERO),
                keys::CHECK_PERIOD_MS,
            ),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(IndexError::Configuration { property, .. }) => assert_eq!(property, expected),
                other => panic!("expected configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn properties_round_trip() {
        let config = IndexConfig::new("articles", "title = dc:title :: text ;")
            .with_description("news")
            .with_batch_size(25)
            .with_core_timeout(Duration::from_millis(1500))
            .with_ranking(3);
        let mut props = Properties::new();
        config.write_properties(&mut props);
        assert_eq!(IndexConfig::from_properties(&props).unwrap(), config);
    }

    #[test]
    fn from_properties_fills_defaults() {
        let mut props = Properties::new();
        props.insert(keys::NAME.into(), "articles".into());
        props.insert(keys::PROGRAM.into(), "t = a :: text ;".into());
        let config = IndexConfig::from_properties(&props).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.source_name, DEFAULT_SOURCE_NAME);
    }

    #[test]
    fn from_properties_requires_program() {
        let mut props = Properties::new();
        props.insert(keys::NAME.into(), "articles".into());
        assert!(matches!(
            IndexConfig::from_properties(&props),
            Err(IndexError::Configuration { property, .. }) if property == keys::PROGRAM
        ));
    }

    #[test]
    fn from_properties_rejects_bad_numbers() {
        let mut props = Properties::new();
        props.insert(keys::NAME.into(), "a".into());
        props.insert(keys::PROGRAM.into(), "p".into());
        props.insert(keys::BATCH_SIZE.into(), "ten".into());
        assert!(IndexConfig::from_properties(&props).is_err());
    }
}
