//! OS signal handling.
//!
//! Translates SIGTERM/SIGINT into the process-wide shutdown signal so that
//! every background loop and the serve call wind down together.

use crate::lifecycle::shutdown::Shutdown;

/// Install signal handlers that trigger the given shutdown coordinator.
pub fn spawn_handlers(shutdown: &Shutdown) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
                _ = term.recv() => tracing::info!("termination signal received"),
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::error!("failed to install interrupt handler");
                return;
            }
            tracing::info!("interrupt received");
        }
        shutdown.trigger();
    });
}
