use super::env_interpolation::interpolate_env_vars;
use super::ConfigError;
use crate::core::reconcile::applier::{DEFAULT_MAX_CONCURRENT_COLLECTIONS, MAX_CONCURRENT_COLLECTIONS};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

/// One side of the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// May reference environment variables, resolved only when connecting.
    pub connection_url: String,

    pub database_name: String,
}

impl DatabaseConfig {
    pub fn resolved_connection_url(&self) -> Result<String, ConfigError> {
        interpolate_env_vars(&self.connection_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_max_concurrent_collections")]
    pub max_concurrent_collections: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { max_concurrent_collections: default_max_concurrent_collections() }
    }
}

impl MigrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENT_COLLECTIONS).contains(&self.max_concurrent_collections) {
            return Err(ConfigError::Invalid(format!(
                "migration.max_concurrent_collections must be between 1 and {}, got {}",
                MAX_CONCURRENT_COLLECTIONS, self.max_concurrent_collections
            )));
        }
        Ok(())
    }
}

fn default_max_concurrent_collections() -> usize {
    DEFAULT_MAX_CONCURRENT_COLLECTIONS
}

/// A custom index as written in the configuration file. The index document is kept raw, and an
/// entry of the wrong shape is kept verbatim, so a malformed entry only fails itself when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomIndexEntry {
    Entry { collection: String, index: Document },
    Malformed(serde_yaml::Value),
}

impl CustomIndexEntry {
    pub fn new(collection: impl Into<String>, index: Document) -> Self {
        Self::Entry { collection: collection.into(), index }
    }

    /// Collection name, if the entry names one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Entry { collection, .. } => Some(collection.as_str()),
            Self::Malformed(value) => value.get("collection").and_then(serde_yaml::Value::as_str),
        }
    }
}
