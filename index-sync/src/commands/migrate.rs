use super::compare::{compare, render_text, Comparison};
use super::create::{self, CreateOutcome};
use super::CommandContext;
use crate::core::client::IndexStore;
use crate::core::reconcile::{apply_plan, ApplyReport};
use crate::error::IndexSyncResult;
use crate::utils::format::render_report;
use std::fmt::Write;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct MigrationOutcome {
    pub comparison: Comparison,
    /// `None` on a dry run.
    pub plan_report: Option<ApplyReport>,
    /// `None` on a dry run or when custom indexes are skipped.
    pub custom: Option<CreateOutcome>,
}

/// Plan against the target, apply the plan, then the configured custom indexes.
pub async fn run(
    source: &dyn IndexStore,
    target: &dyn IndexStore,
    context: &CommandContext,
    dry_run: bool,
    skip_custom: bool,
) -> IndexSyncResult<MigrationOutcome> {
    let comparison = compare(source, target, &context.scope, &context.cancel).await?;
    if dry_run {
        info!("Dry run, nothing applied");
        return Ok(MigrationOutcome { comparison, plan_report: None, custom: None });
    }

    let plan_report = apply_plan(target, &comparison.plan, &context.apply_options()).await;
    let custom = if skip_custom { None } else { Some(create::run(target, context).await) };

    Ok(MigrationOutcome { comparison, plan_report: Some(plan_report), custom })
}

pub fn render(outcome: &MigrationOutcome) -> String {
    let mut out = render_text(&outcome.comparison);
    match &outcome.plan_report {
        Some(report) => out.push_str(&render_report("Migration", report)),
        None => {
            let _ = writeln!(out, "Dry run: no index was created");
        }
    }
    if let Some(custom) = &outcome.custom {
        out.push_str(&create::render(custom));
    }
    out
}
