use super::CommandContext;
use crate::core::client::IndexStore;
use crate::core::reconcile::apply_custom_indexes;
use crate::error::IndexSyncResult;
use crate::interactive::{InteractiveSession, Step};
use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Input lines, ending when the sender side is dropped.
pub type LineReceiver = mpsc::Receiver<std::io::Result<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub created: usize,
    pub saved: usize,
}

/// Stdin lines fed from a plain thread. The thread is never joined, so a pending read does not
/// hold up runtime shutdown.
pub fn spawn_stdin_reader() -> LineReceiver {
    let (sender, receiver) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
        debug!("Stdin reader stopped");
    });
    receiver
}

/// Drive an [`InteractiveSession`] over line input until the user finishes, input ends or the
/// run is cancelled. Only `Create` touches the target and only `Save` writes the configuration.
pub async fn run<W>(
    target: &dyn IndexStore,
    context: &mut CommandContext,
    mut input: LineReceiver,
    output: &mut W,
) -> IndexSyncResult<SessionSummary>
where
    W: AsyncWrite + Unpin,
{
    let mut session = InteractiveSession::new();
    let mut summary = SessionSummary::default();

    loop {
        output.write_all(session.prompt().as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = input.recv() => line.transpose()?,
            _ = context.cancel.cancelled() => None,
        };
        let Some(line) = line else {
            output.write_all(b"\n").await?;
            break;
        };

        match session.feed(&line) {
            Step::Prompt => {}
            Step::Invalid(message) => output.write_all(format!("{}\n", message).as_bytes()).await?,
            Step::Create(spec) => {
                let report = apply_custom_indexes(target, std::slice::from_ref(&spec), &context.apply_options()).await;
                for application in &report.outcomes {
                    let (collection, name) = (&application.collection, &application.descriptor.name);
                    output.write_all(format!("{}.{}: {}\n", collection, name, application.outcome).as_bytes()).await?;
                }
                summary.created += report.summary().created;
            }
            Step::Save(spec) => {
                if !context.config.add_custom_index(&spec) {
                    output.write_all(b"An equivalent index is already configured\n").await?;
                    continue;
                }
                match context.store.save(&context.config) {
                    Ok(()) => {
                        info!(collection = %spec.collection, index = %spec.index.name, "Saved custom index");
                        output.write_all(format!("Saved to {}\n", context.store.path().display()).as_bytes()).await?;
                        summary.saved += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to save configuration");
                        output.write_all(format!("Could not save: {}\n", e).as_bytes()).await?;
                    }
                }
            }
            Step::Finished => break,
        }
    }

    output.flush().await?;
    Ok(summary)
}
