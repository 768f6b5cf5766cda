pub mod env_interpolation;
pub mod types;

use crate::core::index::{equivalent, DescriptorError, IndexDescriptor};
use crate::core::reconcile::{CustomIndexSpec, DuplicateIndexMatcher};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use types::*;

pub const DEFAULT_CONFIG_PATH: &str = "index-sync.yaml";

const CONFIG_VERSION_FIELD: &str = "config_version";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to write config file {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing required field 'config_version' in config file. Current supported version: 1")]
    MissingVersion,

    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Why a `custom_indexes` entry could not be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CustomIndexEntryError {
    #[error("expected a mapping with a `collection` name and an `index` mapping")]
    Shape,

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// One malformed `custom_indexes` entry. Other entries are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("custom index #{position} on {}: {reason}", .collection.as_deref().unwrap_or("unnamed collection"))]
pub struct ConfigParseError {
    pub position: usize,
    pub collection: Option<String>,
    pub reason: CustomIndexEntryError,
}

/// Versioned configuration wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "config_version")]
pub enum IndexSyncConfigVersioned {
    #[serde(rename = "1")]
    V1(IndexSyncConfigV1),
}

impl IndexSyncConfigVersioned {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut yaml_value: serde_yaml::Value = serde_yaml::from_str(content)?;

        let version = match yaml_value.get(CONFIG_VERSION_FIELD) {
            None | Some(serde_yaml::Value::Null) => return Err(ConfigError::MissingVersion),
            Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            Some(_) => None,
        };
        // `config_version: 1` written without quotes is accepted as "1"
        if let (Some(version), Some(mapping)) = (version, yaml_value.as_mapping_mut()) {
            mapping.insert(CONFIG_VERSION_FIELD.into(), serde_yaml::Value::String(version));
        }

        Ok(serde_yaml::from_value(yaml_value)?)
    }

    pub fn into_canonical(self) -> IndexSyncConfig {
        match self {
            IndexSyncConfigVersioned::V1(v1) => v1,
        }
    }
}

/// Canonical configuration (always latest version internally)
pub type IndexSyncConfig = IndexSyncConfigV1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSyncConfigV1 {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,

    /// Collections in scope. Empty means every non-system collection of the source.
    #[serde(default)]
    pub collections: Vec<String>,

    #[serde(default)]
    pub custom_indexes: Vec<CustomIndexEntry>,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub duplicate_index: DuplicateIndexMatcher,
}

impl IndexSyncConfigV1 {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.migration.validate()?;
        for (side, db) in [("source", &self.source), ("target", &self.target)] {
            if db.database_name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{}.database_name must not be empty", side)));
            }
        }
        Ok(())
    }

    /// Parse every custom index entry independently.
    pub fn custom_index_specs(&self) -> (Vec<CustomIndexSpec>, Vec<ConfigParseError>) {
        let mut specs = Vec::with_capacity(self.custom_indexes.len());
        let mut errors = Vec::new();
        for (position, entry) in self.custom_indexes.iter().enumerate() {
            let collection = entry.collection().map(str::to_string);
            let CustomIndexEntry::Entry { collection: name, index } = entry else {
                errors.push(ConfigParseError { position, collection, reason: CustomIndexEntryError::Shape });
                continue;
            };
            match IndexDescriptor::from_document(index) {
                Ok(index) => specs.push(CustomIndexSpec::new(name.clone(), index)),
                Err(reason) => errors.push(ConfigParseError { position, collection, reason: reason.into() }),
            }
        }
        (specs, errors)
    }

    /// Append a custom index unless an equivalent one is already configured for the collection.
    pub fn add_custom_index(&mut self, spec: &CustomIndexSpec) -> bool {
        let (existing, _) = self.custom_index_specs();
        if existing.iter().any(|e| e.collection == spec.collection && equivalent(&e.index, &spec.index)) {
            return false;
        }
        self.custom_indexes.push(CustomIndexEntry::new(spec.collection.clone(), spec.index.to_document()));
        true
    }
}

/// The configuration file on disk.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<IndexSyncConfig, ConfigError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|source| ConfigError::Read { path: self.path.clone(), source })?;
        let config = IndexSyncConfigVersioned::from_yaml_str(&content)?.into_canonical();
        config.validate()?;
        Ok(config)
    }

    /// Replace the file atomically: write a sibling temporary file, then rename it over the original.
    pub fn save(&self, config: &IndexSyncConfig) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(&IndexSyncConfigVersioned::V1(config.clone()))?;
        let write_error = |source| ConfigError::Write { path: self.path.clone(), source };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        file.write_all(content.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        file.persist(&self.path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::KeyPattern;
    use assert_matches::assert_matches;
    use mongodb::bson::doc;

    const MINIMAL: &str = r#"
config_version: "1"
source:
  connection_url: "mongodb://localhost:27017"
  database_name: app
target:
  connection_url: "${INDEX_SYNC_TEST_TARGET:-mongodb://localhost:27018}"
  database_name: app
"#;

    fn email_spec() -> CustomIndexSpec {
        let key = KeyPattern::from_document(&doc! { "email": 1 }).unwrap();
        CustomIndexSpec::new("users", IndexDescriptor::new(key).with_unique(true))
    }

    #[test]
    fn test_missing_config_version() {
        let result = IndexSyncConfigVersioned::from_yaml_str("source: {}\n");
        assert_matches!(result, Err(ConfigError::MissingVersion));
    }

    #[test]
    fn test_invalid_config_version() {
        let yaml = MINIMAL.replace("config_version: \"1\"", "config_version: \"999\"");
        assert_matches!(IndexSyncConfigVersioned::from_yaml_str(&yaml), Err(ConfigError::Parse(_)));
    }

    #[test]
    fn test_unquoted_config_version() {
        let yaml = MINIMAL.replace("config_version: \"1\"", "config_version: 1");
        assert!(IndexSyncConfigVersioned::from_yaml_str(&yaml).is_ok());
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let config = IndexSyncConfigVersioned::from_yaml_str(MINIMAL).unwrap().into_canonical();

        assert!(config.collections.is_empty());
        assert!(config.custom_indexes.is_empty());
        assert_eq!(config.migration.max_concurrent_collections, 4);
        assert_eq!(config.duplicate_index, DuplicateIndexMatcher::default());
        // interpolation is deferred to connect time
        assert_eq!(config.target.connection_url, "${INDEX_SYNC_TEST_TARGET:-mongodb://localhost:27018}");
    }

    #[test]
    fn test_concurrency_out_of_range_rejected() {
        let yaml = format!("{}migration:\n  max_concurrent_collections: 12\n", MINIMAL);
        let config = IndexSyncConfigVersioned::from_yaml_str(&yaml).unwrap().into_canonical();
        assert_matches!(config.validate(), Err(ConfigError::Invalid(_)));
    }

    #[test]
    fn test_custom_index_entries_parse_independently() {
        let yaml = format!(
            "{}custom_indexes:\n  - collection: users\n    index: {{ key: {{ email: 1 }}, unique: true }}\n  - collection: \
             orders\n    index: {{ name: broken }}\n  - collection: logs\n    index: {{ key: {{ at: 1 }}, \
             expireAfterSeconds: 0 }}\n",
            MINIMAL
        );
        let config = IndexSyncConfigVersioned::from_yaml_str(&yaml).unwrap().into_canonical();

        let (specs, errors) = config.custom_index_specs();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].index.name, "email_1");
        assert!(specs[0].index.unique);
        assert_eq!(specs[1].index.expire_after_seconds, Some(0));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position, 1);
        assert_eq!(errors[0].collection.as_deref(), Some("orders"));
        assert_eq!(errors[0].reason, CustomIndexEntryError::Descriptor(DescriptorError::MissingKey));
    }

    #[test]
    fn test_badly_shaped_entries_do_not_fail_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("index-sync.yaml"));
        let yaml = format!(
            "{}custom_indexes:\n  - collection: users\n    index: {{ key: {{ email: 1 }} }}\n  - collection: \
             orders\n    index: oops\n  - index: {{ key: {{ at: 1 }} }}\n  - just a string\n",
            MINIMAL
        );
        std::fs::write(store.path(), yaml).unwrap();

        let config = store.load().unwrap();
        let (specs, errors) = config.custom_index_specs();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].collection, "users");
        let positions: Vec<_> = errors.iter().map(|e| (e.position, e.collection.as_deref())).collect();
        assert_eq!(positions, vec![(1, Some("orders")), (2, None), (3, None)]);
        assert!(errors.iter().all(|e| e.reason == CustomIndexEntryError::Shape));
        assert!(errors[1].to_string().starts_with("custom index #2 on unnamed collection: expected a mapping"));

        // malformed entries survive a save untouched
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap().custom_indexes, config.custom_indexes);
    }

    #[test]
    fn test_add_custom_index_skips_equivalent_entry() {
        let mut config = IndexSyncConfigVersioned::from_yaml_str(MINIMAL).unwrap().into_canonical();

        assert!(config.add_custom_index(&email_spec()));
        assert!(!config.add_custom_index(&email_spec()));
        let renamed = CustomIndexSpec::new("users", email_spec().index.with_name("by_email"));
        assert!(!config.add_custom_index(&renamed));
        let other_collection = CustomIndexSpec::new("admins", email_spec().index);
        assert!(config.add_custom_index(&other_collection));

        assert_eq!(config.custom_indexes.len(), 2);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("index-sync.yaml"));
        std::fs::write(store.path(), MINIMAL).unwrap();

        let mut config = store.load().unwrap();
        config.add_custom_index(&email_spec());
        store.save(&config).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.target.connection_url, config.target.connection_url);
        let (specs, errors) = reloaded.custom_index_specs();
        assert!(errors.is_empty());
        assert_eq!(specs, vec![email_spec()]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.yaml"));
        assert_matches!(store.load(), Err(ConfigError::Read { .. }));
    }
}
