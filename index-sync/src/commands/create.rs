use super::CommandContext;
use crate::config::ConfigParseError;
use crate::core::client::IndexStore;
use crate::core::reconcile::{apply_custom_indexes, ApplyReport};
use crate::utils::format::{render_parse_errors, render_report};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct CreateOutcome {
    pub report: ApplyReport,
    pub parse_errors: Vec<ConfigParseError>,
}

/// Apply every configured custom index on the target. Malformed entries are reported and skipped.
pub async fn run(target: &dyn IndexStore, context: &CommandContext) -> CreateOutcome {
    let (specs, parse_errors) = context.config.custom_index_specs();
    for error in &parse_errors {
        warn!(error = %error, "Skipping malformed custom index");
    }

    let report = apply_custom_indexes(target, &specs, &context.apply_options()).await;
    CreateOutcome { report, parse_errors }
}

pub fn render(outcome: &CreateOutcome) -> String {
    let mut out = render_parse_errors(&outcome.parse_errors);
    out.push_str(&render_report("Custom indexes", &outcome.report));
    out
}
