use clap::Parser as _;
use dotenvy::dotenv;
use index_sync::cli::Cli;
use index_sync::commands;
use index_sync::utils::logging::init_logging;
use index_sync::utils::signal::cancel_on_shutdown;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    init_logging()?;
    let cli = Cli::parse();
    info!("Starting index-sync");

    let cancel = CancellationToken::new();
    let signal_task = cancel_on_shutdown(cancel.clone());

    let result = commands::run(cli, cancel.clone()).await;

    // releases the signal task
    cancel.cancel();
    let _ = signal_task.await;

    if let Err(e) = &result {
        error!(error = %e, error_chain = ?e, "index-sync failed");
    }
    Ok(result?)
}
