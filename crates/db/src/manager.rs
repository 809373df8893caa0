//! Connection manager
//!
//! Owns the current pool and the in-flight creation slot. Both live behind a
//! single mutex so that "is there a pool, is one being built, or do I build
//! one" is decided in one step:
//!
//! ```text
//! Absent ──▶ Creating ──▶ Ready ──(probe fails)──▶ Creating ──▶ Ready ──▶ … ──▶ Closed
//!               │                                                            ▲
//!               └──(build fails)──▶ Absent            shutdown() from any state ┘
//! ```
//!
//! A creation is a [`Shared`] future. Every caller that finds the manager in
//! `Creating` awaits the same future, so one pool is built per cycle and its
//! result (or error) reaches every waiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::backends::{same_pool, DatabaseBackend, DatabasePool, DatabasePoolStats, MySqlBackend};
use crate::config::{DatabaseConfig, PoolSettings};
use crate::error::{DatabaseError, DatabaseResult};
use crate::row::QueryResult;
use crate::value::DatabaseValue;

/// Shared handle to the current pool
pub type PoolHandle = Arc<dyn DatabasePool>;

type PendingCreation = Shared<BoxFuture<'static, DatabaseResult<PoolHandle>>>;

enum PoolState {
    Absent,
    Creating {
        generation: u64,
        pending: PendingCreation,
    },
    Ready(PoolHandle),
    Closed,
}

impl PoolState {
    fn phase(&self) -> PoolPhase {
        match self {
            PoolState::Absent => PoolPhase::Absent,
            PoolState::Creating { .. } => PoolPhase::Creating,
            PoolState::Ready(_) => PoolPhase::Ready,
            PoolState::Closed => PoolPhase::Closed,
        }
    }
}

/// Observable lifecycle phase of the managed pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    Absent,
    Creating,
    Ready,
    Closed,
}

#[derive(Default)]
struct Counters {
    pools_created: AtomicU64,
    creation_failures: AtomicU64,
    probe_failures: AtomicU64,
    queries: AtomicU64,
    query_errors: AtomicU64,
}

/// Manager statistics since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub pools_created: u64,
    pub creation_failures: u64,
    pub probe_failures: u64,
    pub queries: u64,
    pub query_errors: u64,
}

enum NextStep {
    Reuse(PoolHandle),
    Join(PendingCreation),
    Create { discard: Option<PoolHandle> },
}

/// Every connection is checked out and the pool cannot open another
fn is_saturated(pool: &PoolHandle) -> bool {
    let stats = pool.stats();
    stats.idle_connections == 0 && stats.total_connections >= pool.max_connections()
}

/// Errors an acquire returns when it gave up waiting rather than failing to connect
fn is_wait_error(err: &DatabaseError) -> bool {
    matches!(
        err,
        DatabaseError::ConnectionTimeout { .. } | DatabaseError::PoolExhausted { .. }
    )
}

/// Lazily creates, health-checks and replaces the database pool
pub struct ConnectionManager {
    backend: Arc<dyn DatabaseBackend>,
    config: Arc<DatabaseConfig>,
    settings: Arc<PoolSettings>,
    state: Arc<Mutex<PoolState>>,
    counters: Arc<Counters>,
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn DatabaseBackend>,
        config: DatabaseConfig,
        settings: PoolSettings,
    ) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(PoolState::Absent)),
            counters: Arc::new(Counters::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Manager over MySQL with the fixed production pool settings
    pub fn mysql(config: DatabaseConfig) -> Self {
        Self::new(Arc::new(MySqlBackend::new()), config, PoolSettings::default())
    }

    /// [`mysql`](Self::mysql) with configuration read from `DB_*` variables
    pub fn from_env() -> DatabaseResult<Self> {
        Ok(Self::mysql(DatabaseConfig::from_env()?))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Build the pool now instead of on first use
    pub async fn init(&self) -> DatabaseResult<()> {
        self.acquire_pool().await.map(|_| ())
    }

    /// Return a pool that just passed a liveness probe, creating or
    /// replacing it as needed
    pub async fn acquire_pool(&self) -> DatabaseResult<PoolHandle> {
        let current = {
            let state = self.state.lock().await;
            match &*state {
                PoolState::Ready(pool) => Some(pool.clone()),
                PoolState::Closed => return Err(DatabaseError::Closed),
                PoolState::Absent | PoolState::Creating { .. } => None,
            }
        };

        let stale = match current {
            Some(pool) => match self.probe(&pool).await {
                Ok(elapsed) => {
                    tracing::debug!("Database pool liveness probe passed in {:?}", elapsed);
                    return Ok(pool);
                }
                Err(e) => {
                    self.counters.probe_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Database pool failed liveness probe, recreating: {}", e);
                    Some(pool)
                }
            },
            None => None,
        };

        self.join_or_create(stale).await
    }

    /// Check out a connection and ping it. Only the ping is bounded by the
    /// probe timeout; waiting for a busy pool to free a connection is not a
    /// liveness failure.
    async fn probe(&self, pool: &PoolHandle) -> DatabaseResult<Duration> {
        let started = Instant::now();

        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) if is_saturated(pool) && is_wait_error(&e) => {
                tracing::debug!("Database pool busy, skipping liveness probe: {}", e);
                return Ok(started.elapsed());
            }
            Err(e) => return Err(e),
        };

        let limit = self.settings.probe_timeout;
        match tokio::time::timeout(limit, conn.ping()).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(e)) => {
                conn.invalidate();
                Err(e)
            }
            Err(_) => {
                conn.invalidate();
                Err(DatabaseError::ConnectionTimeout {
                    timeout_secs: limit.as_secs(),
                })
            }
        }
    }

    async fn join_or_create(&self, stale: Option<PoolHandle>) -> DatabaseResult<PoolHandle> {
        let pending = {
            let mut state = self.state.lock().await;

            let next = match &*state {
                PoolState::Closed => return Err(DatabaseError::Closed),
                PoolState::Creating { pending, .. } => NextStep::Join(pending.clone()),
                PoolState::Absent => NextStep::Create { discard: None },
                PoolState::Ready(current) => match &stale {
                    Some(stale) if same_pool(stale, current) => NextStep::Create {
                        discard: Some(current.clone()),
                    },
                    // Replaced by another caller since we looked
                    _ => NextStep::Reuse(current.clone()),
                },
            };

            match next {
                NextStep::Reuse(pool) => return Ok(pool),
                NextStep::Join(pending) => {
                    tracing::debug!("Joining in-flight database pool creation");
                    pending
                }
                NextStep::Create { discard } => {
                    if let Some(old) = discard {
                        self.close_in_background(old);
                    }
                    self.start_creation(&mut state)
                }
            }
        };

        pending.await
    }

    /// Install a new creation in `state`. The caller holds the state lock.
    fn start_creation(&self, state: &mut PoolState) -> PendingCreation {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let backend = Arc::clone(&self.backend);
        let config = Arc::clone(&self.config);
        let settings = Arc::clone(&self.settings);
        let slot = Arc::clone(&self.state);
        let counters = Arc::clone(&self.counters);

        let creation = async move {
            tracing::info!(
                "Creating {} pool for {} (max {} connections)",
                backend.name(),
                config.display_target(),
                settings.max_connections
            );
            let started = Instant::now();
            let outcome = backend.create_pool(&config, &settings).await;

            let mut state = slot.lock().await;
            let still_current = matches!(
                &*state,
                PoolState::Creating { generation: g, .. } if *g == generation
            );

            match outcome {
                Ok(pool) if still_current => {
                    counters.pools_created.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("✅ Database pool ready in {:?}", started.elapsed());
                    *state = PoolState::Ready(Arc::clone(&pool));
                    Ok(pool)
                }
                Ok(pool) => {
                    drop(state);
                    tracing::info!("Manager shut down during pool creation, closing new pool");
                    if let Err(e) = pool.close().await {
                        tracing::warn!("Error closing pool created during shutdown: {}", e);
                    }
                    Err(DatabaseError::Closed)
                }
                Err(err) => {
                    counters.creation_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Failed to create database pool: {}", err);
                    if still_current {
                        *state = PoolState::Absent;
                    }
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        *state = PoolState::Creating {
            generation,
            pending: creation.clone(),
        };
        creation
    }

    fn close_in_background(&self, pool: PoolHandle) {
        let limit = self.settings.shutdown_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, pool.close()).await {
                Ok(Ok(())) => tracing::debug!("Closed discarded database pool"),
                Ok(Err(e)) => tracing::warn!("Error closing discarded database pool: {}", e),
                Err(_) => tracing::warn!("Timed out after {:?} closing discarded database pool", limit),
            }
        });
    }

    /// Run one statement on a pooled connection. `params` are bound to the
    /// statement's `?` placeholders in order. The connection goes back to
    /// the pool whether the statement succeeds or fails.
    pub async fn run_query(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<QueryResult> {
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        let outcome = self.execute(sql, params).await;
        if let Err(e) = &outcome {
            self.counters.query_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Query error: {} (statement: {})", e, sql);
        }
        outcome
    }

    /// [`run_query`](Self::run_query) returning the rows as a JSON array
    pub async fn run_query_json(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<JsonValue> {
        Ok(self.run_query(sql, params).await?.rows_json())
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<QueryResult> {
        let pool = self.acquire_pool().await?;
        let mut conn = pool.acquire().await?;

        tracing::debug!("Executing statement with {} bound parameter(s)", params.len());
        let started = Instant::now();

        let outcome = match self.settings.statement_timeout {
            None => conn.query(sql, params).await,
            Some(limit) => {
                let timed = tokio::time::timeout(limit, conn.query(sql, params)).await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        conn.invalidate();
                        Err(DatabaseError::StatementTimeout {
                            timeout_ms: limit.as_millis() as u64,
                        })
                    }
                }
            }
        };

        drop(conn);
        tracing::trace!("Statement finished in {:?}", started.elapsed());
        outcome
    }

    /// Close the current pool. Idempotent, bounded by the shutdown timeout
    /// and never fails; later calls to [`acquire_pool`](Self::acquire_pool)
    /// return [`DatabaseError::Closed`].
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, PoolState::Closed)
        };

        match previous {
            PoolState::Closed => tracing::debug!("Connection manager already shut down"),
            PoolState::Absent => tracing::info!("Connection manager shut down, no pool was open"),
            PoolState::Creating { .. } => {
                tracing::info!("Connection manager shut down during pool creation")
            }
            PoolState::Ready(pool) => {
                let limit = self.settings.shutdown_timeout;
                match tokio::time::timeout(limit, pool.close()).await {
                    Ok(Ok(())) => tracing::info!("Connection pool closed"),
                    Ok(Err(e)) => tracing::error!("Error closing connection pool: {}", e),
                    Err(_) => tracing::warn!("Timed out after {:?} closing connection pool", limit),
                }
            }
        }
    }

    pub async fn state(&self) -> PoolPhase {
        self.state.lock().await.phase()
    }

    /// Statistics of the current pool, if one is ready
    pub async fn pool_stats(&self) -> Option<DatabasePoolStats> {
        match &*self.state.lock().await {
            PoolState::Ready(pool) => Some(pool.stats()),
            _ => None,
        }
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            pools_created: self.counters.pools_created.load(Ordering::Relaxed),
            creation_failures: self.counters.creation_failures.load(Ordering::Relaxed),
            probe_failures: self.counters.probe_failures.load(Ordering::Relaxed),
            queries: self.counters.queries.load(Ordering::Relaxed),
            query_errors: self.counters.query_errors.load(Ordering::Relaxed),
        }
    }
}
