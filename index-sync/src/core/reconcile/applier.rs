//! Index applier.
//!
//! Creates missing indexes on the target. Failures are data here: every attempt ends in an
//! [`IndexCreationOutcome`] and nothing is raised past the per-index boundary. Collections are
//! processed concurrently up to a worker limit; within one collection `ensure_collection`
//! completes before the first index is created and indexes are created one at a time.

use super::duplicate::DuplicateIndexMatcher;
use super::planner::ReconciliationPlan;
use super::CustomIndexSpec;
use crate::core::client::database::{DatabaseError, IndexStore};
use crate::core::index::IndexDescriptor;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_MAX_CONCURRENT_COLLECTIONS: usize = 4;
pub const MAX_CONCURRENT_COLLECTIONS: usize = 9;

pub const ID_INDEX_SKIP_REASON: &str = "_id_ reserved";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationFailure {
    pub code: Option<i32>,
    pub message: String,
}

impl From<&DatabaseError> for CreationFailure {
    fn from(error: &DatabaseError) -> Self {
        Self { code: error.code(), message: error.to_string() }
    }
}

impl fmt::Display for CreationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Terminal state of one creation attempt. There are no retries at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum IndexCreationOutcome {
    Created,
    AlreadyExists,
    Skipped(String),
    Failed(CreationFailure),
}

impl fmt::Display for IndexCreationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
            Self::Failed(failure) => write!(f, "failed: {}", failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexApplication {
    pub collection: String,
    pub descriptor: IndexDescriptor,
    pub outcome: IndexCreationOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub created: usize,
    pub already_existing: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created: {}, already existing: {}, skipped: {}, failed: {}",
            self.created, self.already_existing, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    /// Outcomes in plan order, then index order within a collection.
    pub outcomes: Vec<IndexApplication>,
    /// The run was cancelled before every index was attempted.
    pub interrupted: bool,
}

impl ApplyReport {
    pub fn summary(&self) -> ApplySummary {
        self.outcomes.iter().fold(ApplySummary::default(), |mut summary, application| {
            match application.outcome {
                IndexCreationOutcome::Created => summary.created += 1,
                IndexCreationOutcome::AlreadyExists => summary.already_existing += 1,
                IndexCreationOutcome::Skipped(_) => summary.skipped += 1,
                IndexCreationOutcome::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &IndexApplication> {
        self.outcomes.iter().filter(|a| matches!(a.outcome, IndexCreationOutcome::Failed(_)))
    }

    pub fn merge(&mut self, other: ApplyReport) {
        self.outcomes.extend(other.outcomes);
        self.interrupted |= other.interrupted;
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Collections processed at once. Clamped to `1..=MAX_CONCURRENT_COLLECTIONS`.
    pub max_concurrent_collections: usize,
    /// Checked before every collection and every index.
    pub cancel: CancellationToken,
    pub duplicate_matcher: DuplicateIndexMatcher,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            max_concurrent_collections: DEFAULT_MAX_CONCURRENT_COLLECTIONS,
            cancel: CancellationToken::new(),
            duplicate_matcher: DuplicateIndexMatcher::default(),
        }
    }
}

/// Create the collection unless it exists. Idempotent.
pub async fn ensure_collection(store: &dyn IndexStore, name: &str) -> Result<(), DatabaseError> {
    if store.collection_exists(name).await? {
        debug!(collection = %name, "Collection already exists");
        return Ok(());
    }

    match store.create_collection(name).await {
        Ok(()) => {
            info!(collection = %name, "Created collection");
            Ok(())
        }
        // someone else created it between the check and the create
        Err(e) if e.is_namespace_exists() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Attempt to create one index. Never fails; the outcome carries what happened.
pub async fn create_index(
    store: &dyn IndexStore,
    collection: &str,
    descriptor: &IndexDescriptor,
    matcher: &DuplicateIndexMatcher,
) -> IndexCreationOutcome {
    if descriptor.is_id_index() {
        return IndexCreationOutcome::Skipped(ID_INDEX_SKIP_REASON.to_string());
    }

    match store.create_index(collection, descriptor.key.to_document(), descriptor.creation_options()).await {
        Ok(()) => IndexCreationOutcome::Created,
        Err(e) if matcher.is_duplicate(&e) => IndexCreationOutcome::AlreadyExists,
        Err(e) => IndexCreationOutcome::Failed(CreationFailure::from(&e)),
    }
}

/// Create every missing index of the plan. Collections missing on the target are created even
/// when they have no index to add.
pub async fn apply_plan(store: &dyn IndexStore, plan: &ReconciliationPlan, options: &ApplyOptions) -> ApplyReport {
    let groups = plan
        .collections
        .iter()
        .map(|plan| CollectionWork { collection: &plan.collection, indexes: plan.missing_indexes.iter().collect() })
        .collect();
    apply_groups(store, groups, options).await
}

/// Create every custom index, without comparing against the target first. Repeat runs rely on
/// [`IndexCreationOutcome::AlreadyExists`] for idempotence.
pub async fn apply_custom_indexes(
    store: &dyn IndexStore,
    specs: &[CustomIndexSpec],
    options: &ApplyOptions,
) -> ApplyReport {
    let mut groups: Vec<CollectionWork<'_>> = Vec::new();
    for spec in specs {
        match groups.iter_mut().find(|group| group.collection == spec.collection) {
            Some(group) => group.indexes.push(&spec.index),
            None => groups.push(CollectionWork { collection: &spec.collection, indexes: vec![&spec.index] }),
        }
    }
    apply_groups(store, groups, options).await
}

struct CollectionWork<'a> {
    collection: &'a str,
    indexes: Vec<&'a IndexDescriptor>,
}

async fn apply_groups(store: &dyn IndexStore, groups: Vec<CollectionWork<'_>>, options: &ApplyOptions) -> ApplyReport {
    let limit = options.max_concurrent_collections.clamp(1, MAX_CONCURRENT_COLLECTIONS);

    // `buffered` keeps results in input order, so the report is deterministic
    let results: Vec<ApplyReport> = stream::iter(groups)
        .map(|work| {
            let span = info_span!("collection", collection = %work.collection);
            apply_collection(store, work, options).instrument(span)
        })
        .buffered(limit)
        .collect()
        .await;

    let mut report = ApplyReport::default();
    for result in results {
        report.merge(result);
    }

    let summary = report.summary();
    info!(
        created = summary.created,
        already_existing = summary.already_existing,
        skipped = summary.skipped,
        failed = summary.failed,
        interrupted = report.interrupted,
        "Index application finished"
    );
    report
}

async fn apply_collection(store: &dyn IndexStore, work: CollectionWork<'_>, options: &ApplyOptions) -> ApplyReport {
    let mut report = ApplyReport::default();
    if options.cancel.is_cancelled() {
        report.interrupted = true;
        return report;
    }

    if let Err(e) = ensure_collection(store, work.collection).await {
        warn!(error = %e, "Could not ensure collection exists, failing its indexes");
        let failure = CreationFailure {
            code: e.code(),
            message: format!("collection {} could not be created: {}", work.collection, e),
        };
        report.outcomes = work
            .indexes
            .into_iter()
            .map(|descriptor| IndexApplication {
                collection: work.collection.to_string(),
                descriptor: descriptor.clone(),
                outcome: IndexCreationOutcome::Failed(failure.clone()),
            })
            .collect();
        return report;
    }

    for descriptor in work.indexes {
        if options.cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }

        let outcome = create_index(store, work.collection, descriptor, &options.duplicate_matcher).await;
        match &outcome {
            IndexCreationOutcome::Created => info!(index = %descriptor.name, key = %descriptor.key, "Created index"),
            IndexCreationOutcome::AlreadyExists => info!(index = %descriptor.name, "Index already exists"),
            IndexCreationOutcome::Skipped(reason) => debug!(index = %descriptor.name, reason = %reason, "Skipped index"),
            IndexCreationOutcome::Failed(failure) => {
                warn!(index = %descriptor.name, error = %failure, "Failed to create index")
            }
        }
        report.outcomes.push(IndexApplication {
            collection: work.collection.to_string(),
            descriptor: descriptor.clone(),
            outcome,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::database::MockIndexStore;
    use crate::core::index::KeyPattern;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use mongodb::bson::doc;

    fn email_index() -> IndexDescriptor {
        IndexDescriptor::new(KeyPattern::from_document(&doc! { "email": 1 }).unwrap()).with_unique(true)
    }

    #[tokio::test]
    async fn id_index_is_skipped_without_touching_the_store() {
        let mut store = MockIndexStore::new();
        store.expect_create_index().never();
        let id = IndexDescriptor::new(KeyPattern::from_document(&doc! { "_id": 1 }).unwrap()).with_name("_id_");

        let outcome = create_index(&store, "users", &id, &DuplicateIndexMatcher::default()).await;

        assert_eq!(outcome, IndexCreationOutcome::Skipped(ID_INDEX_SKIP_REASON.to_string()));
    }

    #[tokio::test]
    async fn create_forwards_key_and_options_separately() {
        let mut store = MockIndexStore::new();
        store
            .expect_create_index()
            .with(eq("users"), eq(doc! { "email": 1 }), eq(doc! { "name": "email_1", "unique": true }))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = create_index(&store, "users", &email_index(), &DuplicateIndexMatcher::default()).await;

        assert_eq!(outcome, IndexCreationOutcome::Created);
    }

    #[tokio::test]
    async fn duplicate_reply_becomes_already_exists_and_other_errors_fail() {
        let mut store = MockIndexStore::new();
        let mut calls = 0;
        store.expect_create_index().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(DatabaseError::IndexAlreadyExists("email_1".into()))
            } else {
                Err(DatabaseError::CommandFailed {
                    code: 85,
                    code_name: "IndexOptionsConflict".into(),
                    message: "Index already exists with a different name: by_email".into(),
                })
            }
        });
        let matcher = DuplicateIndexMatcher::default();

        assert_eq!(create_index(&store, "users", &email_index(), &matcher).await, IndexCreationOutcome::AlreadyExists);
        assert_matches!(
            create_index(&store, "users", &email_index(), &matcher).await,
            IndexCreationOutcome::Failed(CreationFailure { code: Some(85), .. })
        );
    }

    #[tokio::test]
    async fn ensure_collection_creates_only_when_absent() {
        let mut store = MockIndexStore::new();
        store.expect_collection_exists().with(eq("present")).returning(|_| Ok(true));
        store.expect_collection_exists().with(eq("absent")).returning(|_| Ok(false));
        store.expect_create_collection().with(eq("absent")).times(1).returning(|_| Ok(()));

        ensure_collection(&store, "present").await.unwrap();
        ensure_collection(&store, "absent").await.unwrap();
    }

    #[tokio::test]
    async fn ensure_collection_tolerates_concurrent_creation() {
        let mut store = MockIndexStore::new();
        store.expect_collection_exists().returning(|_| Ok(false));
        store.expect_create_collection().returning(|_| {
            Err(DatabaseError::CommandFailed { code: 48, code_name: "NamespaceExists".into(), message: "exists".into() })
        });

        assert!(ensure_collection(&store, "users").await.is_ok());
    }

    #[tokio::test]
    async fn collection_failure_fails_its_indexes_only() {
        let mut store = MockIndexStore::new();
        store.expect_collection_exists().with(eq("broken")).returning(|_| {
            Err(DatabaseError::CommandFailed { code: 13, code_name: "Unauthorized".into(), message: "denied".into() })
        });
        store.expect_collection_exists().with(eq("users")).returning(|_| Ok(true));
        store.expect_create_index().times(1).returning(|_, _, _| Ok(()));

        let specs = vec![
            CustomIndexSpec::new("broken", email_index()),
            CustomIndexSpec::new("users", email_index()),
            CustomIndexSpec::new("broken", email_index().with_name("second")),
        ];
        let report = apply_custom_indexes(&store, &specs, &ApplyOptions::default()).await;

        let collections: Vec<_> = report.outcomes.iter().map(|a| a.collection.as_str()).collect();
        assert_eq!(collections, vec!["broken", "broken", "users"]);
        assert_eq!(report.summary(), ApplySummary { created: 1, already_existing: 0, skipped: 0, failed: 2 });
        assert_eq!(report.failures().count(), 2);
    }

    #[tokio::test]
    async fn cancelled_run_attempts_nothing() {
        let mut store = MockIndexStore::new();
        store.expect_collection_exists().never();
        store.expect_create_index().never();
        let options = ApplyOptions::default();
        options.cancel.cancel();

        let report = apply_custom_indexes(&store, &[CustomIndexSpec::new("users", email_index())], &options).await;

        assert!(report.interrupted);
        assert!(report.outcomes.is_empty());
    }
}
