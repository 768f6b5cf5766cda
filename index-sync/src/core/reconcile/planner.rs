//! Reconciliation planner.
//!
//! Pure: issues no database operations, so a plan can be inspected, logged or persisted before
//! anything on the target is mutated.

use super::inventory::CollectionInventory;
use crate::core::index::{conflicts, equivalent, IndexDescriptor};
use crate::core::reconcile::CustomIndexSpec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Actions needed for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPlan {
    pub collection: String,
    pub collection_missing_on_target: bool,
    /// Source indexes with no equivalent on the target, in source order.
    pub missing_indexes: Vec<IndexDescriptor>,
    /// Missing indexes whose name is already used on the target by a different definition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_conflicts: Vec<String>,
}

/// Collections needing action, in source order. Collections already in sync are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub collections: Vec<CollectionPlan>,
}

impl ReconciliationPlan {
    /// Source and target are already in sync.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionPlan> {
        self.collections.iter().find(|plan| plan.collection == collection)
    }

    pub fn missing_index_count(&self) -> usize {
        self.collections.iter().map(|plan| plan.missing_indexes.len()).sum()
    }

    /// Missing indexes as custom index specs, for persisting the plan into configuration.
    pub fn to_custom_specs(&self) -> Vec<CustomIndexSpec> {
        self.collections
            .iter()
            .flat_map(|plan| {
                plan.missing_indexes.iter().map(|index| CustomIndexSpec::new(plan.collection.clone(), index.clone()))
            })
            .collect()
    }
}

/// Diff a source inventory against the target.
///
/// `_id_` is dropped from both sides first. A source collection absent from
/// `target_collections` is flagged and all its indexes are missing; otherwise an index is
/// missing when no target index of the same collection is [`equivalent`] to it.
pub fn plan(
    source: &[CollectionInventory],
    target_collections: &[String],
    target_indexes: &HashMap<String, Vec<IndexDescriptor>>,
) -> ReconciliationPlan {
    let target_collections: HashSet<&str> = target_collections.iter().map(String::as_str).collect();
    let no_indexes = Vec::new();

    let collections = source
        .iter()
        .filter_map(|inventory| {
            let collection_missing_on_target = !target_collections.contains(inventory.name.as_str());
            let on_target: Vec<&IndexDescriptor> = if collection_missing_on_target {
                Vec::new()
            } else {
                target_indexes.get(&inventory.name).unwrap_or(&no_indexes).iter().filter(|t| !t.is_id_index()).collect()
            };

            let missing_indexes: Vec<IndexDescriptor> = inventory
                .indexes
                .iter()
                .filter(|s| !s.is_id_index())
                .filter(|s| !on_target.iter().any(|t| equivalent(s, t)))
                .cloned()
                .collect();

            let name_conflicts = missing_indexes
                .iter()
                .filter(|s| on_target.iter().any(|t| conflicts(s, t)))
                .map(|s| s.name.clone())
                .collect();

            (collection_missing_on_target || !missing_indexes.is_empty()).then(|| CollectionPlan {
                collection: inventory.name.clone(),
                collection_missing_on_target,
                missing_indexes,
                name_conflicts,
            })
        })
        .collect();

    ReconciliationPlan { collections }
}
