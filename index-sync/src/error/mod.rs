use thiserror::Error;

use crate::config::ConfigError;
use crate::core::client::database::DatabaseError;

/// Result type for index-sync operations
pub type IndexSyncResult<T> = Result<T, IndexSyncError>;

/// Error types for index-sync
#[derive(Error, Debug)]
pub enum IndexSyncError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Output error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    EncodeError(#[from] serde_json::Error),
}
