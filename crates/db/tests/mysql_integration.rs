//! Tests against a live MySQL server
//!
//! Set `STOCKBOOK_TEST_DB_HOST` (and optionally `STOCKBOOK_TEST_DB_USER`,
//! `STOCKBOOK_TEST_DB_PASSWORD`, `STOCKBOOK_TEST_DB_NAME`,
//! `STOCKBOOK_TEST_DB_PORT`) to run them. Without it every test returns early.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use stockbook_db::{
    ConnectionManager, DatabaseConfig, DatabaseError, DatabaseValue, MySqlBackend, PoolPhase,
    PoolSettings,
};

fn live_config() -> Option<DatabaseConfig> {
    let host = env::var("STOCKBOOK_TEST_DB_HOST").ok()?;
    let var = |key: &str, default: &str| env::var(key).unwrap_or_else(|_| default.to_string());

    let port = var("STOCKBOOK_TEST_DB_PORT", "3306").parse().unwrap_or(3306);
    Some(
        DatabaseConfig::new(
            host,
            var("STOCKBOOK_TEST_DB_USER", "root"),
            var("STOCKBOOK_TEST_DB_PASSWORD", ""),
            var("STOCKBOOK_TEST_DB_NAME", "stockbook_test"),
        )
        .with_port(port),
    )
}

async fn seed_user_table(manager: &ConnectionManager) {
    manager
        .run_query(
            "CREATE TABLE IF NOT EXISTS stockbook_it_user (id INT PRIMARY KEY, name VARCHAR(64) NOT NULL)",
            &[],
        )
        .await
        .unwrap();
    manager
        .run_query("DELETE FROM stockbook_it_user", &[])
        .await
        .unwrap();
    manager
        .run_query(
            "INSERT INTO stockbook_it_user (id, name) VALUES (?, ?), (?, ?)",
            &[5i64.into(), "ada".into(), 7i64.into(), "lin".into()],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_select_with_bound_id() {
    let Some(config) = live_config() else {
        return;
    };
    let manager = ConnectionManager::mysql(config);
    seed_user_table(&manager).await;

    let result = manager
        .run_query(
            "SELECT id, name FROM stockbook_it_user WHERE id = ?",
            &[DatabaseValue::from(5i64)],
        )
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let row = result.first().unwrap();
    assert_eq!(row.get::<i64>("id").unwrap(), 5);
    assert_eq!(row.get::<String>("name").unwrap(), "ada");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_injection_literal_matches_nothing() {
    let Some(config) = live_config() else {
        return;
    };
    let manager = ConnectionManager::mysql(config);
    seed_user_table(&manager).await;

    let result = manager
        .run_query(
            "SELECT id FROM stockbook_it_user WHERE name = ?",
            &[DatabaseValue::from("ada' OR '1'='1")],
        )
        .await
        .unwrap();
    assert!(result.is_empty());

    // Table is still intact
    let count = manager
        .run_query("SELECT COUNT(*) AS n FROM stockbook_it_user", &[])
        .await
        .unwrap();
    assert_eq!(count.first().unwrap().get::<i64>("n").unwrap(), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_write_reports_rows_affected() {
    let Some(config) = live_config() else {
        return;
    };
    let manager = ConnectionManager::mysql(config);
    seed_user_table(&manager).await;

    let result = manager
        .run_query(
            "UPDATE stockbook_it_user SET name = ? WHERE id = ?",
            &["grace".into(), 7i64.into()],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);
    assert!(result.is_empty());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_syntax_error_is_query_error() {
    let Some(config) = live_config() else {
        return;
    };
    let manager = ConnectionManager::mysql(config);

    let err = manager.run_query("SELEC 1", &[]).await.unwrap_err();
    assert!(err.is_query_error());

    // Connection went back; the pool still serves statements
    manager.run_query("SELECT 1", &[]).await.unwrap();
    manager.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_host_then_recovery() {
    let Some(config) = live_config() else {
        return;
    };
    let settings = PoolSettings::default().with_connect_timeout(Duration::from_secs(2));

    let unreachable = ConnectionManager::new(
        Arc::new(MySqlBackend::new()),
        config.clone().with_port(1),
        settings.clone(),
    );
    let err = unreachable.acquire_pool().await.err().unwrap();
    assert!(err.is_connection_error());
    assert_eq!(unreachable.state().await, PoolPhase::Absent);

    let reachable = ConnectionManager::new(
        Arc::new(MySqlBackend::new()),
        config,
        settings,
    );
    reachable.run_query("SELECT 1", &[]).await.unwrap();
    assert_eq!(reachable.state().await, PoolPhase::Ready);

    reachable.shutdown().await;
    assert_eq!(reachable.state().await, PoolPhase::Closed);
}

#[tokio::test]
async fn test_queue_limit_rejects_extra_waiters() {
    let Some(config) = live_config() else {
        return;
    };
    let settings = PoolSettings::default()
        .with_max_connections(1)
        .with_queue_limit(1);
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(MySqlBackend::new()),
        config,
        settings,
    ));
    manager.init().await.unwrap();

    let holder = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run_query("SELECT SLEEP(1)", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run_query("SELECT 1", &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // One caller already waits for the only connection
    let err = manager.run_query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, DatabaseError::PoolExhausted { limit: 1 }));

    assert!(holder.await.unwrap().is_ok());
    assert!(waiter.await.unwrap().is_ok());
    // The busy pool was never replaced
    assert_eq!(manager.stats().pools_created, 1);

    manager.shutdown().await;
}
