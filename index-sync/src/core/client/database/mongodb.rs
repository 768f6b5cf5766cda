use super::error::DatabaseError;
use super::IndexStore;
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info};

/// A collection holds at most 64 indexes, so a single batch always covers the listing.
const LIST_INDEXES_BATCH_SIZE: i32 = 128;

const CONNECTION_SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// `note` set on a `createIndexes` reply when nothing was built.
const ALL_INDEXES_EXIST_NOTE: &str = "all indexes already exist";

/// MongoDB implementation of [`IndexStore`] bound to one database.
#[derive(Debug)]
pub struct MongoIndexStore {
    client: Client,
    database: Database,
}

impl MongoIndexStore {
    /// Connect and verify the server answers a `ping`, so an unreachable database fails here
    /// rather than on the first real operation.
    pub async fn connect(connection_url: &str, database_name: &str) -> Result<Self, DatabaseError> {
        if !CONNECTION_SCHEMES.iter().any(|scheme| connection_url.starts_with(scheme)) {
            return Err(DatabaseError::InvalidConnectionUrl(redact(connection_url)));
        }
        let client = Client::with_uri_str(connection_url).await?;
        let database = client.database(database_name);
        database.run_command(doc! { "ping": 1 }, None).await?;
        info!(database = %database_name, "Connected to MongoDB");
        Ok(Self { client, database })
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Close every pooled connection. Consumes the store so it cannot be used afterwards.
    pub async fn shutdown(self) {
        let name = self.database.name().to_string();
        self.client.shutdown().await;
        debug!(database = %name, "MongoDB connection closed");
    }
}

/// Connection string with the credentials cut out, safe to log.
fn redact(connection_url: &str) -> String {
    match connection_url.split_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => connection_url.to_string(),
    }
}

#[async_trait]
impl IndexStore for MongoIndexStore {
    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        // views have no indexes of their own
        timed("list_collection_names", async {
            Ok(self.database.list_collection_names(doc! { "type": "collection" }).await?)
        })
        .await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        timed("collection_exists", async {
            let names = self.database.list_collection_names(doc! { "name": name, "type": "collection" }).await?;
            Ok(!names.is_empty())
        })
        .await
    }

    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError> {
        timed("create_collection", async { Ok(self.database.create_collection(name, None).await?) }).await
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>, DatabaseError> {
        timed("list_indexes", async {
            let command = doc! { "listIndexes": collection, "cursor": { "batchSize": LIST_INDEXES_BATCH_SIZE } };
            let reply = self.database.run_command(command, None).await?;
            let batch = reply
                .get_document("cursor")
                .and_then(|cursor| cursor.get_array("firstBatch"))
                .map_err(|e| DatabaseError::UnexpectedReply(format!("listIndexes on {}: {}", collection, e)))?;

            batch
                .iter()
                .map(|entry| match entry {
                    Bson::Document(index) => Ok(index.clone()),
                    other => Err(DatabaseError::UnexpectedReply(format!("index entry is not a document: {}", other))),
                })
                .collect()
        })
        .await
    }

    async fn create_index(&self, collection: &str, keys: Document, options: Document) -> Result<(), DatabaseError> {
        timed("create_index", async {
            let name = options.get_str("name").unwrap_or_default().to_string();
            let mut spec = doc! { "key": keys };
            for (option, value) in options {
                spec.insert(option, value);
            }

            let reply =
                self.database.run_command(doc! { "createIndexes": collection, "indexes": [spec] }, None).await?;

            if index_already_existed(&reply) {
                return Err(DatabaseError::IndexAlreadyExists(name));
            }
            Ok(())
        })
        .await
    }
}

/// The server answers an identical request with ok: 1 and an unchanged index count. Behind
/// mongos the counts are reported per shard under `raw`.
fn index_already_existed(reply: &Document) -> bool {
    if reply.get_str("note").is_ok_and(|note| note == ALL_INDEXES_EXIST_NOTE) {
        return true;
    }
    if let Some(unchanged) = unchanged_index_count(reply) {
        return unchanged;
    }

    let Ok(raw) = reply.get_document("raw") else { return false };
    let shards: Vec<&Document> = raw.values().filter_map(Bson::as_document).collect();
    !shards.is_empty()
        && shards.iter().all(|shard| {
            shard.get_str("note").is_ok_and(|note| note == ALL_INDEXES_EXIST_NOTE)
                || unchanged_index_count(shard).unwrap_or(false)
        })
}

fn unchanged_index_count(reply: &Document) -> Option<bool> {
    let before = reply.get("numIndexesBefore").and_then(as_i64)?;
    let after = reply.get("numIndexesAfter").and_then(as_i64)?;
    Some(before == after)
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}

/// Run a database operation and record how long it took.
async fn timed<T, F>(operation: &'static str, future: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    let start = Instant::now();
    let result = future.await;
    debug!(operation, elapsed_ms = start.elapsed().as_millis() as u64, success = result.is_ok(), "database operation");
    result
}
