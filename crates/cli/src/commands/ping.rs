use anyhow::Context;
use stockbook_db::ConnectionManager;

/// Acquire the pool, time one probe and print the pool statistics
pub async fn run(manager: &ConnectionManager) -> anyhow::Result<()> {
    println!("🔍 Connecting to {}", manager.config().display_target());

    let pool = manager
        .acquire_pool()
        .await
        .context("Database is not reachable")?;
    let latency = pool.health_check().await.context("Ping failed")?;
    let stats = pool.stats();

    println!("✅ Database reachable ({:?} round-trip)", latency);
    println!(
        "   Connections: {} total, {} idle, {} active (max {})",
        stats.total_connections,
        stats.idle_connections,
        stats.active_connections,
        pool.max_connections()
    );

    Ok(())
}
