//! Index inventory reader.
//!
//! Enumerates the collections in scope and their index descriptors. Collection enumeration is
//! fatal when it fails because it decides the scope; reading the indexes of one collection is
//! not, the collection simply reads as having no indexes and a [`PartialReadWarning`] is kept.

use crate::core::client::database::{DatabaseError, IndexStore};
use crate::core::index::IndexDescriptor;
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Collections the server manages itself (`system.views`, `system.profile`, ...).
const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Index read for one collection failed, fully or for some entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialReadWarning {
    pub collection: String,
    pub reason: String,
}

impl fmt::Display for PartialReadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not read indexes of {}: {}", self.collection, self.reason)
    }
}

/// A collection and its indexes, in the order the server returned them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInventory {
    pub name: String,
    pub indexes: Vec<IndexDescriptor>,
}

/// Result of listing the indexes of one collection.
#[derive(Debug, Clone, Default)]
pub struct IndexListing {
    pub indexes: Vec<IndexDescriptor>,
    pub warning: Option<PartialReadWarning>,
    /// The server reported the name as missing or as a view.
    pub not_a_collection: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub collections: Vec<CollectionInventory>,
    pub warnings: Vec<PartialReadWarning>,
    /// Names in scope that turned out to be missing or views, in read order.
    pub not_collections: Vec<String>,
    /// Reading stopped early because the run was cancelled.
    pub interrupted: bool,
}

impl Inventory {
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&CollectionInventory> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Collections that exist as regular collections, the only ones worth reconciling.
    pub fn existing_collections(&self) -> Vec<CollectionInventory> {
        self.collections.iter().filter(|c| !self.not_collections.contains(&c.name)).cloned().collect()
    }
}

/// Collections in scope. A non-empty `explicit` list is returned verbatim without checking that
/// the collections exist; otherwise every non-system collection is enumerated, sorted by name.
pub async fn list_collections(store: &dyn IndexStore, explicit: &[String]) -> Result<Vec<String>, DatabaseError> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }

    let mut names = store.list_collection_names().await?;
    names.retain(|name| !name.starts_with(SYSTEM_COLLECTION_PREFIX));
    names.sort();
    Ok(names)
}

/// Indexes of one collection. Never fails: read errors become a warning and an empty listing,
/// and entries that cannot be read as descriptors are dropped with a warning.
pub async fn list_indexes(store: &dyn IndexStore, collection: &str) -> IndexListing {
    let documents = match store.list_indexes(collection).await {
        Ok(documents) => documents,
        Err(e) => {
            let warning = PartialReadWarning { collection: collection.to_string(), reason: e.to_string() };
            warn!(collection = %collection, error = %e, "Failed to read indexes, treating collection as having none");
            let not_a_collection = e.is_not_a_collection();
            return IndexListing { indexes: Vec::new(), warning: Some(warning), not_a_collection };
        }
    };

    let mut indexes = Vec::with_capacity(documents.len());
    let mut unreadable = Vec::new();
    for document in &documents {
        match IndexDescriptor::from_document(document) {
            Ok(descriptor) => indexes.push(descriptor),
            Err(e) => {
                warn!(collection = %collection, index = %document, error = %e, "Skipping unreadable index");
                unreadable.push(e.to_string());
            }
        }
    }

    let warning = (!unreadable.is_empty()).then(|| PartialReadWarning {
        collection: collection.to_string(),
        reason: format!("{} unreadable index(es): {}", unreadable.len(), unreadable.join("; ")),
    });
    debug!(collection = %collection, count = indexes.len(), "Read indexes");
    IndexListing { indexes, warning, not_a_collection: false }
}

/// Read the indexes of every named collection, in order.
pub async fn read_inventory(store: &dyn IndexStore, names: &[String], cancel: &CancellationToken) -> Inventory {
    let mut inventory = Inventory::default();
    for name in names {
        if cancel.is_cancelled() {
            inventory.interrupted = true;
            break;
        }
        let listing = list_indexes(store, name).await;
        if listing.not_a_collection {
            inventory.not_collections.push(name.clone());
        }
        inventory.warnings.extend(listing.warning);
        inventory.collections.push(CollectionInventory { name: name.clone(), indexes: listing.indexes });
    }
    inventory
}

/// Source inventory for the scope, plus the target's full collection list and its inventory for
/// the same scope. Both sides are read concurrently.
pub async fn read_both(
    source: &dyn IndexStore,
    target: &dyn IndexStore,
    scope: &[String],
    cancel: &CancellationToken,
) -> Result<(Inventory, Vec<String>, Inventory), DatabaseError> {
    let (source_names, target_names) = tokio::try_join!(list_collections(source, scope), list_collections(target, &[]))?;

    // only collections in the source scope matter on the target side
    let target_scope: Vec<String> = source_names.iter().filter(|name| target_names.contains(name)).cloned().collect();

    let (source_inventory, target_inventory) = tokio::join!(
        read_inventory(source, &source_names, cancel),
        read_inventory(target, &target_scope, cancel)
    );
    Ok((source_inventory, target_names, target_inventory))
}
