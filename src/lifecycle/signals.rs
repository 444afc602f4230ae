//! OS signal handling.

use crate::lifecycle::Shutdown;

/// Wait for an interrupt (Ctrl+C / SIGINT) and trigger graceful shutdown.
pub async fn shutdown_on_interrupt(shutdown: Shutdown) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install interrupt handler");
        return;
    }
    tracing::info!("interrupt received, shutting down");
    shutdown.trigger();
}
