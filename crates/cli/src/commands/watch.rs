use std::sync::Arc;
use std::time::Duration;

use stockbook_db::{run_until_shutdown, ConnectionManager};

/// Probe the pool every `interval_secs` until a termination signal arrives
pub async fn run(manager: Arc<ConnectionManager>, interval_secs: u64) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    tracing::info!(
        "Watching {} every {:?} (Ctrl+C to stop)",
        manager.config().display_target(),
        interval
    );

    let probing = {
        let manager = Arc::clone(&manager);
        async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                probe_once(&manager).await;
            }
        }
    };

    run_until_shutdown(&manager, probing).await;

    let stats = manager.stats();
    tracing::info!(
        "Stopped watching: {} pool(s) created, {} creation failure(s), {} failed probe(s)",
        stats.pools_created,
        stats.creation_failures,
        stats.probe_failures
    );
    Ok(())
}

async fn probe_once(manager: &ConnectionManager) {
    match manager.acquire_pool().await {
        Ok(pool) => {
            let stats = pool.stats();
            tracing::info!(
                "Database healthy: {} total, {} idle, {} active connection(s)",
                stats.total_connections,
                stats.idle_connections,
                stats.active_connections
            );
        }
        Err(e) => tracing::error!("Database unhealthy: {}", e),
    }
}
