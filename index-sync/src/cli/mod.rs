use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "index-sync",
    version,
    about = "Synchronize MongoDB secondary indexes from a source database to a target database",
    long_about = "index-sync compares the secondary indexes of two MongoDB databases and creates the ones missing \
    on the target. Index definitions are compared semantically, so an index that exists under another name \
    with the same definition is not recreated.\n\n\
    Connection strings, scope and custom indexes are read from a YAML configuration file.",
    after_help = "Examples:\n  \
    index-sync compare\n  \
    index-sync migrate --dry-run\n  \
    index-sync --config prod.yaml migrate --skip-custom\n  \
    index-sync --collection users list-target"
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, global = true, env = "INDEX_SYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Restrict the run to these collections, overriding `collections` from the configuration
    #[arg(long = "collection", global = true, value_name = "NAME")]
    pub collections: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create every source index missing on the target, then the configured custom indexes
    Migrate {
        /// Print the plan without creating anything
        #[arg(long)]
        dry_run: bool,

        /// Do not apply the custom indexes from the configuration
        #[arg(long)]
        skip_custom: bool,
    },
    /// Create the custom indexes from the configuration on the target
    Create,
    /// Author custom indexes interactively against the target
    Interactive,
    /// List the collections and indexes of the source database
    ListSource,
    /// List the collections and indexes of the target database
    ListTarget,
    /// Show which source indexes are missing on the target
    Compare {
        /// Append the missing indexes to `custom_indexes` in the configuration file
        #[arg(long)]
        save: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}
