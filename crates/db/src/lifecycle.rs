//! Process lifecycle - signal handling and pool teardown

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::manager::ConnectionManager;

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("📡 Received Ctrl+C, closing database pool...");
        },
        _ = terminate => {
            warn!("📡 Received terminate signal, closing database pool...");
        },
    }
}

impl ConnectionManager {
    /// Spawn the process hook that shuts the manager down on the first
    /// termination signal
    pub fn shutdown_on_signal(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            shutdown_signal().await;
            self.shutdown().await;
        })
    }
}

/// Drive `work` until it finishes or a termination signal arrives, then shut
/// the manager down. Returns `None` if the signal won.
pub async fn run_until_shutdown<F, T>(manager: &ConnectionManager, work: F) -> Option<T>
where
    F: Future<Output = T>,
{
    let outcome = tokio::select! {
        out = work => Some(out),
        _ = shutdown_signal() => None,
    };

    manager.shutdown().await;
    outcome
}
