//! Command handlers driven against the in-memory store and a configuration file in a temp dir.

use super::common::InMemoryIndexStore;
use crate::commands::interactive::LineReceiver;
use crate::commands::{compare, create, interactive, list, migrate, CommandContext};
use crate::config::ConfigStore;
use crate::core::reconcile::IndexCreationOutcome;
use mongodb::bson::doc;
use rstest::{fixture, rstest};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
config_version: "1"
source:
  connection_url: "mongodb://localhost:27017"
  database_name: app
target:
  connection_url: "mongodb://localhost:27018"
  database_name: app
custom_indexes:
  - collection: audit
    index: { key: { at: 1 }, name: at_1, expireAfterSeconds: 3600 }
  - collection: audit
    index: { unique: true }
"#;

struct Workspace {
    // keeps the directory alive for the duration of the test
    _dir: TempDir,
    context: CommandContext,
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("index-sync.yaml"));
    std::fs::write(store.path(), CONFIG).unwrap();
    let config = store.load().unwrap();
    Workspace { _dir: dir, context: CommandContext::new(store, config, CancellationToken::new()) }
}

fn source() -> InMemoryIndexStore {
    InMemoryIndexStore::new()
        .with_index("users", doc! { "key": { "email": 1 }, "name": "email_1", "unique": true })
        .with_collection("orders")
}

#[rstest]
#[tokio::test]
async fn dry_run_plans_but_writes_nothing(workspace: Workspace) {
    let target = InMemoryIndexStore::new();

    let outcome = migrate::run(&source(), &target, &workspace.context, true, false).await.unwrap();

    assert_eq!(outcome.comparison.plan.collections.len(), 2);
    assert!(outcome.plan_report.is_none());
    assert!(outcome.custom.is_none());
    assert_eq!(target.create_index_calls(), 0);
    assert!(!target.has_collection("users"));
    assert!(migrate::render(&outcome).contains("Dry run"));
}

#[rstest]
#[tokio::test]
async fn migrate_applies_plan_then_custom_indexes(workspace: Workspace) {
    let target = InMemoryIndexStore::new();

    let outcome = migrate::run(&source(), &target, &workspace.context, false, false).await.unwrap();

    let plan_report = outcome.plan_report.unwrap();
    assert_eq!(plan_report.summary().created, 1);
    let custom = outcome.custom.unwrap();
    assert_eq!(custom.report.summary().created, 1);
    assert_eq!(custom.parse_errors.len(), 1);
    assert_eq!(target.index_names("audit"), vec!["_id_", "at_1"]);
    assert!(target.has_collection("orders"));
}

#[rstest]
#[tokio::test]
async fn skip_custom_leaves_custom_indexes_alone(workspace: Workspace) {
    let target = InMemoryIndexStore::new();

    let outcome = migrate::run(&source(), &target, &workspace.context, false, true).await.unwrap();

    assert!(outcome.custom.is_none());
    assert!(!target.has_collection("audit"));
}

#[rstest]
#[tokio::test]
async fn create_reports_malformed_entries_and_is_repeatable(workspace: Workspace) {
    let target = InMemoryIndexStore::new();

    let first = create::run(&target, &workspace.context).await;
    let second = create::run(&target, &workspace.context).await;

    assert_eq!(first.report.outcomes[0].outcome, IndexCreationOutcome::Created);
    assert_eq!(second.report.outcomes[0].outcome, IndexCreationOutcome::AlreadyExists);
    assert_eq!(first.parse_errors[0].position, 1);
    assert!(create::render(&first).contains("skipping custom index #1 on audit"));
}

#[rstest]
#[tokio::test]
async fn compare_save_persists_missing_indexes_once(mut workspace: Workspace) {
    let target = InMemoryIndexStore::new();
    let comparison = compare::compare(&source(), &target, &[], &workspace.context.cancel).await.unwrap();

    let added = compare::save_plan(&mut workspace.context, &comparison.plan).unwrap();
    let added_again = compare::save_plan(&mut workspace.context, &comparison.plan).unwrap();

    assert_eq!(added, 1);
    assert_eq!(added_again, 0);
    let reloaded = workspace.context.store.load().unwrap();
    let (specs, _) = reloaded.custom_index_specs();
    assert!(specs.iter().any(|spec| spec.collection == "users" && spec.index.name == "email_1" && spec.index.unique));
}

#[rstest]
#[tokio::test]
async fn compare_renders_json(workspace: Workspace) {
    let comparison =
        compare::compare(&source(), &InMemoryIndexStore::new(), &[], &workspace.context.cancel).await.unwrap();

    let json = compare::render(&comparison, true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["plan"]["collections"][0]["collection"], "orders");
    assert_eq!(value["plan"]["collections"][1]["missing_indexes"][0]["name"], "email_1");
}

#[rstest]
#[tokio::test]
async fn list_prints_every_collection(workspace: Workspace) {
    let inventory = list::run(&source(), &[], &workspace.context.cancel).await.unwrap();

    let text = list::render("Source", "app", &inventory);

    assert!(text.contains("Source database app (2 collections)"));
    assert!(text.contains("email_1 { email: 1 } unique"));
}

#[rstest]
#[tokio::test]
async fn interactive_session_creates_and_saves(mut workspace: Workspace) {
    let target = InMemoryIndexStore::new();
    let input = lines("products\nsku:1\nunique\ny\ny\nn\n");
    let mut output = Vec::new();

    let summary = interactive::run(&target, &mut workspace.context, input, &mut output).await.unwrap();

    assert_eq!(summary, interactive::SessionSummary { created: 1, saved: 1 });
    assert_eq!(target.index_names("products"), vec!["_id_", "sku_1"]);
    let (specs, _) = workspace.context.store.load().unwrap().custom_index_specs();
    assert!(specs.iter().any(|spec| spec.collection == "products" && spec.index.name == "sku_1"));
    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.contains("products.sku_1: created"));
}

#[rstest]
#[tokio::test]
async fn interactive_session_reprompts_on_invalid_input_and_stops_at_eof(mut workspace: Workspace) {
    let target = InMemoryIndexStore::new();
    let input = lines("products\nsku\n");
    let mut output = Vec::new();

    let summary = interactive::run(&target, &mut workspace.context, input, &mut output).await.unwrap();

    assert_eq!(summary, interactive::SessionSummary::default());
    assert_eq!(target.create_index_calls(), 0);
    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.contains("`sku` is not field:direction"));
    assert_eq!(transcript.matches("Index fields").count(), 2);
}

#[rstest]
#[tokio::test]
async fn interactive_session_declining_save_leaves_config_untouched(mut workspace: Workspace) {
    let target = InMemoryIndexStore::new();
    let before = std::fs::read_to_string(workspace.context.store.path()).unwrap();
    let input = lines("products\nsku:1\n\nn\nno\nno\n");
    let mut output = Vec::new();

    let summary = interactive::run(&target, &mut workspace.context, input, &mut output).await.unwrap();

    assert_eq!(summary, interactive::SessionSummary::default());
    assert_eq!(std::fs::read_to_string(workspace.context.store.path()).unwrap(), before);
}

/// A closed channel holding `input` split into lines.
fn lines(input: &str) -> LineReceiver {
    let lines: Vec<&str> = input.lines().collect();
    let (sender, receiver) = mpsc::channel(lines.len().max(1));
    for line in lines {
        sender.try_send(Ok(line.to_string())).unwrap();
    }
    receiver
}

#[rstest]
#[tokio::test]
async fn interactive_session_ends_on_cancel_while_waiting_for_input(mut workspace: Workspace) {
    let target = InMemoryIndexStore::new();
    // the sender stays open, as with a terminal nobody types into
    let (_sender, input) = mpsc::channel(1);
    let mut output = Vec::new();
    workspace.context.cancel.cancel();

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        interactive::run(&target, &mut workspace.context, input, &mut output),
    )
    .await
    .expect("session should end once cancelled")
    .unwrap();

    assert_eq!(summary, interactive::SessionSummary::default());
    assert!(String::from_utf8(output).unwrap().starts_with("Collection name: "));
}
