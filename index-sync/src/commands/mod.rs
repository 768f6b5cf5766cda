//! One handler per CLI command.
//!
//! Each handler opens only the connections it needs and closes them on every exit path. The
//! work itself lives in store-agnostic functions so it runs against any
//! [`IndexStore`](crate::core::client::IndexStore).

pub mod compare;
pub mod create;
pub mod interactive;
pub mod list;
pub mod migrate;

use crate::cli::{Cli, Commands};
use crate::config::{ConfigStore, DatabaseConfig, IndexSyncConfig};
use crate::core::client::MongoIndexStore;
use crate::core::reconcile::ApplyOptions;
use crate::error::IndexSyncResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a command needs besides its connections.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub store: ConfigStore,
    pub config: IndexSyncConfig,
    /// Collections in scope. Empty means every non-system collection.
    pub scope: Vec<String>,
    pub cancel: CancellationToken,
}

impl CommandContext {
    pub fn new(store: ConfigStore, config: IndexSyncConfig, cancel: CancellationToken) -> Self {
        let scope = config.collections.clone();
        Self { store, config, scope, cancel }
    }

    /// Load the configuration named on the command line. `--collection` replaces the configured scope.
    pub fn load(cli: &Cli, cancel: CancellationToken) -> IndexSyncResult<Self> {
        let store = ConfigStore::new(&cli.config);
        let config = store.load()?;
        debug!(path = %store.path().display(), "Loaded configuration");

        let mut context = Self::new(store, config, cancel);
        if !cli.collections.is_empty() {
            context.scope = cli.collections.clone();
        }
        Ok(context)
    }

    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            max_concurrent_collections: self.config.migration.max_concurrent_collections,
            cancel: self.cancel.clone(),
            duplicate_matcher: self.config.duplicate_index.clone(),
        }
    }
}

pub async fn connect(database: &DatabaseConfig) -> IndexSyncResult<MongoIndexStore> {
    let url = database.resolved_connection_url()?;
    Ok(MongoIndexStore::connect(&url, &database.database_name).await?)
}

async fn connect_both(config: &IndexSyncConfig) -> IndexSyncResult<(MongoIndexStore, MongoIndexStore)> {
    let source = connect(&config.source).await?;
    match connect(&config.target).await {
        Ok(target) => Ok((source, target)),
        Err(e) => {
            source.shutdown().await;
            Err(e)
        }
    }
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, cancel: CancellationToken) -> IndexSyncResult<()> {
    let mut context = CommandContext::load(&cli, cancel)?;
    info!(command = ?cli.command, scope = ?context.scope, "Running command");

    match cli.command {
        Commands::Migrate { dry_run, skip_custom } => {
            let (source, target) = connect_both(&context.config).await?;
            let result = migrate::run(&source, &target, &context, dry_run, skip_custom).await;
            close(vec![source, target]).await;
            print!("{}", migrate::render(&result?));
        }
        Commands::Create => {
            let target = connect(&context.config.target).await?;
            let outcome = create::run(&target, &context).await;
            target.shutdown().await;
            print!("{}", create::render(&outcome));
        }
        Commands::Interactive => {
            let target = connect(&context.config.target).await?;
            let mut stdout = tokio::io::stdout();
            let stdin = interactive::spawn_stdin_reader();
            let result = interactive::run(&target, &mut context, stdin, &mut stdout).await;
            target.shutdown().await;
            info!(summary = ?result?, "Interactive session finished");
        }
        Commands::ListSource => list_side("Source", &context.config.source, &context).await?,
        Commands::ListTarget => list_side("Target", &context.config.target, &context).await?,
        Commands::Compare { save, json } => {
            let (source, target) = connect_both(&context.config).await?;
            let result = compare::compare(&source, &target, &context.scope, &context.cancel).await;
            close(vec![source, target]).await;
            let comparison = result?;

            print!("{}", compare::render(&comparison, json)?);
            if save {
                let added = compare::save_plan(&mut context, &comparison.plan)?;
                println!("Saved {} index(es) to {}", added, context.store.path().display());
            }
        }
    }
    Ok(())
}

async fn list_side(label: &str, database: &DatabaseConfig, context: &CommandContext) -> IndexSyncResult<()> {
    let store = connect(database).await?;
    let result = list::run(&store, &context.scope, &context.cancel).await;
    store.shutdown().await;
    print!("{}", list::render(label, &database.database_name, &result?));
    Ok(())
}

async fn close(stores: Vec<MongoIndexStore>) {
    for store in stores {
        store.shutdown().await;
    }
}
