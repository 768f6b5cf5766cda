pub mod error;
pub mod mongodb;

use async_trait::async_trait;
use ::mongodb::bson::Document;
pub use error::DatabaseError;

/// Trait defining the database operations the reconciliation engine depends on.
///
/// Implementations are handed to the engine already connected; the engine never opens or closes
/// them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// list_collection_names - Names of every regular collection in the database, views excluded
    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError>;

    /// collection_exists - Whether a regular collection with this exact name exists
    async fn collection_exists(&self, name: &str) -> Result<bool, DatabaseError>;

    /// create_collection - Create an empty collection
    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError>;

    /// list_indexes - Raw index documents of a collection, in server order
    async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>, DatabaseError>;

    /// create_index - Create one index. Fails with `DatabaseError::IndexAlreadyExists` when the
    /// server reports the exact index as already present.
    async fn create_index(&self, collection: &str, keys: Document, options: Document) -> Result<(), DatabaseError>;
}
