use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signal types that interrupt a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Terminate,
    /// SIGINT - Ctrl+C
    Interrupt,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Cancel `token` when the process is interrupted. Work already started finishes; nothing new
/// is attempted. The returned task ends on its own once the token is cancelled by anyone.
pub fn cancel_on_shutdown(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                warn!("Received {}, finishing in-flight work and stopping", signal);
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownSignal {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!(error = %e, "Failed to create SIGTERM handler, listening for Ctrl+C only");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        signal = wait_for_ctrl_c() => signal,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownSignal {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> ShutdownSignal {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        // never resolve rather than cancel a run nobody interrupted
        std::future::pending::<()>().await;
    }
    info!("Interactive shutdown initiated (SIGINT/Ctrl+C)");
    ShutdownSignal::Interrupt
}
