use super::CommandContext;
use crate::core::client::IndexStore;
use crate::core::index::IndexDescriptor;
use crate::core::reconcile::{plan, read_both, PartialReadWarning, ReconciliationPlan};
use crate::error::IndexSyncResult;
use crate::utils::format::render_plan;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Comparison {
    pub plan: ReconciliationPlan,
    pub warnings: Vec<PartialReadWarning>,
    /// Reading was cancelled, so the plan may be incomplete.
    pub interrupted: bool,
}

/// Read both sides for the scope and plan what the target is missing. Nothing is written.
pub async fn compare(
    source: &dyn IndexStore,
    target: &dyn IndexStore,
    scope: &[String],
    cancel: &CancellationToken,
) -> IndexSyncResult<Comparison> {
    let (source_inventory, target_names, target_inventory) = read_both(source, target, scope, cancel).await?;

    let target_indexes: HashMap<String, Vec<IndexDescriptor>> =
        target_inventory.collections.into_iter().map(|c| (c.name, c.indexes)).collect();
    for name in &source_inventory.not_collections {
        warn!(collection = %name, "Not a collection on source, leaving it out of the plan");
    }
    let plan = plan(&source_inventory.existing_collections(), &target_names, &target_indexes);

    let mut warnings = source_inventory.warnings;
    warnings.extend(target_inventory.warnings);
    for collection in &plan.collections {
        for name in &collection.name_conflicts {
            let collection = &collection.collection;
            warn!(collection = %collection, index = %name, "Index name is used on target by a different definition");
        }
    }
    info!(
        collections = plan.collections.len(),
        missing_indexes = plan.missing_index_count(),
        warnings = warnings.len(),
        "Planned index reconciliation"
    );

    Ok(Comparison {
        plan,
        warnings,
        interrupted: source_inventory.interrupted || target_inventory.interrupted,
    })
}

/// Append the missing indexes of `plan` to the custom indexes and save the configuration.
/// Returns how many entries were added; the file is left untouched when none were.
pub fn save_plan(context: &mut CommandContext, plan: &ReconciliationPlan) -> IndexSyncResult<usize> {
    let added = plan.to_custom_specs().iter().filter(|spec| context.config.add_custom_index(spec)).count();
    if added > 0 {
        context.store.save(&context.config)?;
        info!(added, path = %context.store.path().display(), "Saved missing indexes as custom indexes");
    }
    Ok(added)
}

pub fn render(comparison: &Comparison, json: bool) -> IndexSyncResult<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(comparison)?));
    }
    Ok(render_text(comparison))
}

pub fn render_text(comparison: &Comparison) -> String {
    let mut out = render_plan(&comparison.plan);
    for warning in &comparison.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }
    if comparison.interrupted {
        let _ = writeln!(out, "interrupted: plan is incomplete");
    }
    out
}
