//! Core Database Backend Traits
//!
//! The manager never talks to a driver directly. A [`DatabaseBackend`] builds
//! pools, a [`DatabasePool`] hands out scoped connections, and a
//! [`DatabaseConnection`] runs one bound statement at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{DatabaseConfig, PoolSettings};
use crate::error::DatabaseResult;
use crate::row::QueryResult;
use crate::value::DatabaseValue;

/// A checked-out connection. Dropping it returns it to its pool.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute `sql` with `params` bound positionally to its placeholders
    async fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<QueryResult>;

    /// Round-trip without running a statement
    async fn ping(&mut self) -> DatabaseResult<()>;

    /// Mark the connection unusable so it is closed instead of returned to
    /// the pool. Called when a statement was abandoned mid-flight.
    fn invalidate(&mut self) {}
}

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Acquire a connection from the pool
    async fn acquire(&self) -> DatabaseResult<Box<dyn DatabaseConnection>>;

    /// Check out one connection, ping it and release it
    async fn health_check(&self) -> DatabaseResult<Duration> {
        let start = std::time::Instant::now();
        let mut conn = self.acquire().await?;
        conn.ping().await?;
        Ok(start.elapsed())
    }

    /// Close every connection. Waits for checked-out connections to return.
    async fn close(&self) -> DatabaseResult<()>;

    fn is_closed(&self) -> bool;

    fn stats(&self) -> DatabasePoolStats;

    fn max_connections(&self) -> u32;
}

/// Database pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabasePoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}

impl DatabasePoolStats {
    pub fn new(total_connections: u32, idle_connections: u32) -> Self {
        Self {
            total_connections,
            idle_connections,
            active_connections: total_connections.saturating_sub(idle_connections),
        }
    }
}

/// Builds pools for one database engine
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool. Fails if the server cannot be reached.
    async fn create_pool(
        &self,
        config: &DatabaseConfig,
        settings: &PoolSettings,
    ) -> DatabaseResult<Arc<dyn DatabasePool>>;

    fn name(&self) -> &'static str;
}

/// Identity comparison for pool handles
pub fn same_pool(a: &Arc<dyn DatabasePool>, b: &Arc<dyn DatabasePool>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
