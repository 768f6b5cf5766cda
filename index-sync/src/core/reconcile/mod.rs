//! The index reconciliation engine: inventory, planning and application.

pub mod applier;
pub mod duplicate;
pub mod inventory;
pub mod planner;

use crate::core::index::IndexDescriptor;
use serde::{Deserialize, Serialize};

pub use applier::{
    apply_custom_indexes, apply_plan, create_index, ensure_collection, ApplyOptions, ApplyReport, ApplySummary,
    CreationFailure, IndexApplication, IndexCreationOutcome,
};
pub use duplicate::DuplicateIndexMatcher;
pub use inventory::{
    list_collections, list_indexes, read_both, read_inventory, CollectionInventory, IndexListing, Inventory,
    PartialReadWarning,
};
pub use planner::{plan, CollectionPlan, ReconciliationPlan};

/// An index supplied out-of-band (configuration or interactive authoring). Always attempted,
/// never compared first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomIndexSpec {
    pub collection: String,
    pub index: IndexDescriptor,
}

impl CustomIndexSpec {
    pub fn new(collection: impl Into<String>, index: IndexDescriptor) -> Self {
        Self { collection: collection.into(), index }
    }
}
