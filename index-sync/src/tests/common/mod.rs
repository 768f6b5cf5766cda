//! In-memory [`IndexStore`] mirroring the server behaviour the engine relies on.

use crate::core::client::database::error::{
    COMMAND_NOT_SUPPORTED_ON_VIEW_CODE, NAMESPACE_EXISTS_CODE, NAMESPACE_NOT_FOUND_CODE,
};
use crate::core::client::database::{DatabaseError, IndexStore};
use crate::core::index::{equivalent, IndexDescriptor};
use crate::core::reconcile::duplicate::{INDEX_KEY_SPECS_CONFLICT_CODE, INDEX_OPTIONS_CONFLICT_CODE};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use rstest::fixture;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const UNAUTHORIZED_CODE: i32 = 13;

#[derive(Default)]
pub struct InMemoryIndexStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    views: HashSet<String>,
    /// Collections whose index listing fails.
    unreadable: HashSet<String>,
    /// Collections that cannot be created.
    uncreatable: HashSet<String>,
    create_index_calls: AtomicUsize,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection holding only the implicit `_id_` index.
    pub fn with_collection(self, name: &str) -> Self {
        self.collections.lock().expect("store lock").insert(name.to_string(), vec![id_index_document()]);
        self
    }

    /// Add an index document to an existing collection, creating it when needed.
    pub fn with_index(self, collection: &str, index: Document) -> Self {
        let mut collections = self.collections.lock().expect("store lock");
        let indexes = collections.entry(collection.to_string()).or_insert_with(|| vec![id_index_document()]);
        indexes.push(with_envelope(index));
        drop(collections);
        self
    }

    /// Add a view. Like a server filtering `listCollections` on `type: collection`, views are
    /// never enumerated and have no indexes.
    pub fn with_view(mut self, name: &str) -> Self {
        self.views.insert(name.to_string());
        self
    }

    pub fn with_unreadable(mut self, collection: &str) -> Self {
        self.unreadable.insert(collection.to_string());
        self
    }

    pub fn with_uncreatable(mut self, collection: &str) -> Self {
        self.uncreatable.insert(collection.to_string());
        self
    }

    pub fn create_index_calls(&self) -> usize {
        self.create_index_calls.load(Ordering::SeqCst)
    }

    pub fn index_names(&self, collection: &str) -> Vec<String> {
        self.collections
            .lock()
            .expect("store lock")
            .get(collection)
            .map(|indexes| indexes.iter().filter_map(|i| i.get_str("name").ok().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.lock().expect("store lock").contains_key(collection)
    }
}

fn id_index_document() -> Document {
    doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" }
}

fn with_envelope(index: Document) -> Document {
    let mut listed = doc! { "v": 2 };
    for (field, value) in index {
        listed.insert(field, value);
    }
    listed
}

fn command_failed(code: i32, code_name: &str, message: String) -> DatabaseError {
    DatabaseError::CommandFailed { code, code_name: code_name.to_string(), message }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn list_collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self.collections.lock().expect("store lock").keys().cloned().collect())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        Ok(self.has_collection(name))
    }

    async fn create_collection(&self, name: &str) -> Result<(), DatabaseError> {
        if self.uncreatable.contains(name) {
            return Err(command_failed(UNAUTHORIZED_CODE, "Unauthorized", format!("not allowed to create {}", name)));
        }
        let mut collections = self.collections.lock().expect("store lock");
        if collections.contains_key(name) || self.views.contains(name) {
            return Err(command_failed(NAMESPACE_EXISTS_CODE, "NamespaceExists", format!("{} already exists", name)));
        }
        collections.insert(name.to_string(), vec![id_index_document()]);
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<Document>, DatabaseError> {
        if self.unreadable.contains(collection) {
            return Err(command_failed(UNAUTHORIZED_CODE, "Unauthorized", "listIndexes denied".to_string()));
        }
        if self.views.contains(collection) {
            return Err(command_failed(
                COMMAND_NOT_SUPPORTED_ON_VIEW_CODE,
                "CommandNotSupportedOnView",
                format!("{} is a view, not a collection", collection),
            ));
        }
        self.collections.lock().expect("store lock").get(collection).cloned().ok_or_else(|| {
            command_failed(NAMESPACE_NOT_FOUND_CODE, "NamespaceNotFound", format!("ns does not exist: {}", collection))
        })
    }

    async fn create_index(&self, collection: &str, keys: Document, options: Document) -> Result<(), DatabaseError> {
        self.create_index_calls.fetch_add(1, Ordering::SeqCst);
        if self.views.contains(collection) {
            return Err(command_failed(
                COMMAND_NOT_SUPPORTED_ON_VIEW_CODE,
                "CommandNotSupportedOnView",
                format!("{} is a view, not a collection", collection),
            ));
        }

        let mut requested = doc! { "key": keys };
        for (option, value) in options {
            requested.insert(option, value);
        }
        let requested_index = IndexDescriptor::from_document(&requested)
            .map_err(|e| command_failed(67, "CannotCreateIndex", e.to_string()))?;

        // like the server, creating an index creates the collection implicitly
        let mut collections = self.collections.lock().expect("store lock");
        let indexes = collections.entry(collection.to_string()).or_insert_with(|| vec![id_index_document()]);

        for existing in indexes.iter() {
            let Ok(existing) = IndexDescriptor::from_document(existing) else { continue };
            let same_name = existing.name == requested_index.name;
            if existing.key == requested_index.key {
                if same_name && equivalent(&existing, &requested_index) {
                    return Err(DatabaseError::IndexAlreadyExists(existing.name));
                }
                let message = if same_name {
                    format!("An existing index has the same name as the requested index: {}", existing.name)
                } else {
                    format!("Index already exists with a different name: {}", existing.name)
                };
                return Err(command_failed(INDEX_OPTIONS_CONFLICT_CODE, "IndexOptionsConflict", message));
            }
            if same_name {
                return Err(command_failed(
                    INDEX_KEY_SPECS_CONFLICT_CODE,
                    "IndexKeySpecsConflict",
                    format!("An existing index has the same name as the requested index: {}", existing.name),
                ));
            }
        }

        indexes.push(with_envelope(requested));
        Ok(())
    }
}

#[fixture]
pub fn empty_store() -> InMemoryIndexStore {
    InMemoryIndexStore::new()
}
