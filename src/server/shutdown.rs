//! Termination signals
//!
//! The server stops accepting requests on SIGTERM or SIGINT and lets
//! in-flight conversions finish.

use tracing::{error, info};

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the received signal. If a handler cannot be
/// registered the error is logged and this waits forever, so the process
/// keeps serving instead of shutting down.
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to register signal handlers");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            "SIGTERM"
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            "SIGINT"
        }
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to wait for Ctrl+C");
        return std::future::pending().await;
    }
    info!("Received Ctrl+C");
    "CTRL_C"
}
