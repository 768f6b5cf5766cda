//! Console rendering of command results. Everything here returns text; printing is left to the
//! commands so logs (stderr) and results (stdout) never interleave.

use crate::config::ConfigParseError;
use crate::core::reconcile::{ApplyReport, IndexCreationOutcome, Inventory, ReconciliationPlan};
use std::fmt::Write;

pub fn render_inventory(label: &str, database: &str, inventory: &Inventory) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} database {} ({} collections)", label, database, inventory.collections.len());
    for collection in &inventory.collections {
        let _ = writeln!(out, "  {}", collection.name);
        if collection.indexes.is_empty() {
            let _ = writeln!(out, "    (no indexes)");
        }
        for index in &collection.indexes {
            let _ = writeln!(out, "    {}", index);
        }
    }
    for warning in &inventory.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }
    if inventory.interrupted {
        let _ = writeln!(out, "interrupted: listing is incomplete");
    }
    out
}

pub fn render_plan(plan: &ReconciliationPlan) -> String {
    if plan.is_empty() {
        return "Source and target indexes are in sync\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} missing index(es) across {} collection(s)",
        plan.missing_index_count(),
        plan.collections.len()
    );
    for collection in &plan.collections {
        let marker = if collection.collection_missing_on_target { " (missing on target)" } else { "" };
        let _ = writeln!(out, "  {}{}", collection.collection, marker);
        for index in &collection.missing_indexes {
            let conflict = if collection.name_conflicts.contains(&index.name) {
                "  [name used by a different index on target]"
            } else {
                ""
            };
            let _ = writeln!(out, "    + {}{}", index, conflict);
        }
    }
    out
}

pub fn render_report(title: &str, report: &ApplyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", title, report.summary());
    for application in &report.outcomes {
        if application.outcome == IndexCreationOutcome::Created {
            let _ = writeln!(out, "  created {}.{}", application.collection, application.descriptor.name);
        }
    }
    for application in report.failures() {
        let _ = writeln!(
            out,
            "  {}.{} {}",
            application.collection, application.descriptor.name, application.outcome
        );
    }
    if report.interrupted {
        let _ = writeln!(out, "  interrupted: remaining indexes were not attempted");
    }
    out
}

pub fn render_parse_errors(errors: &[ConfigParseError]) -> String {
    errors.iter().map(|e| format!("skipping {}\n", e)).collect()
}
