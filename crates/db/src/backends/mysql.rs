//! MySQL Backend Implementation
//!
//! Uses sqlx as the underlying driver. Statements are always sent as
//! prepared statements with bound arguments; parameter values never touch
//! the SQL text.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow,
};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column, Connection, Either, Row as SqlxRow, TypeInfo, ValueRef};

use super::core::*;
use crate::config::{DatabaseConfig, PoolSettings};
use crate::error::{DatabaseError, DatabaseResult};
use crate::row::{QueryResult, Row};
use crate::value::DatabaseValue;

/// MySQL database backend implementation
#[derive(Debug, Default)]
pub struct MySqlBackend;

impl MySqlBackend {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
    }
}

#[async_trait]
impl DatabaseBackend for MySqlBackend {
    async fn create_pool(
        &self,
        config: &DatabaseConfig,
        settings: &PoolSettings,
    ) -> DatabaseResult<Arc<dyn DatabasePool>> {
        let timeout_secs = settings.connect_timeout.as_secs();
        let wait_limit = settings.acquire_timeout.unwrap_or(settings.connect_timeout);

        tracing::debug!(
            "Creating MySQL pool for {}: max={}, queue_limit={}, connect_timeout={:?}, keep_alive={}",
            config.display_target(),
            settings.max_connections,
            settings.queue_limit,
            settings.connect_timeout,
            settings.keep_alive
        );

        // connect_with opens one connection up front, so a bad host or
        // credentials fail here rather than on the first query
        let connect = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(wait_limit)
            .test_before_acquire(false)
            .connect_with(Self::connect_options(config));

        let pool = tokio::time::timeout(settings.connect_timeout, connect)
            .await
            .map_err(|_| DatabaseError::ConnectionTimeout { timeout_secs })?
            .map_err(|e| DatabaseError::from_connect(e, timeout_secs))?;

        if settings.keep_alive {
            spawn_keep_alive(pool.clone(), settings.keep_alive_initial_delay);
        }

        Ok(Arc::new(MySqlPoolHandle::new(pool, settings)))
    }

    fn name(&self) -> &'static str {
        "mysql"
    }
}

/// Ping every idle connection once per `interval` until the pool closes
fn spawn_keep_alive(pool: MySqlPool, interval: Duration) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let dropped = ping_idle_connections(&pool).await;
            if dropped > 0 {
                tracing::debug!("Keep-alive dropped {} dead connection(s)", dropped);
            }
        }

        tracing::trace!("Keep-alive task stopped");
    });
}

/// Ping each idle connection once, detaching the ones that fail. Returns
/// how many were dropped.
async fn ping_idle_connections(pool: &MySqlPool) -> usize {
    let mut dropped = 0;

    // Idle connections are handed out FIFO, so acquire-ping-release in a
    // loop visits each of them
    for _ in 0..pool.num_idle() {
        let Some(mut conn) = pool.try_acquire() else {
            break;
        };
        if let Err(e) = conn.ping().await {
            tracing::debug!("Keep-alive ping failed, dropping connection: {}", e);
            drop(conn.detach());
            dropped += 1;
        }
    }

    dropped
}

/// Caps how many callers may wait for a connection at once. A limit of 0
/// admits every caller.
#[derive(Debug)]
struct WaiterGate {
    limit: u32,
    waiting: Arc<AtomicU32>,
}

impl WaiterGate {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            waiting: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Register a waiter. The returned guard releases the slot when dropped.
    fn enter(&self) -> DatabaseResult<Option<WaiterGuard>> {
        if self.limit == 0 {
            return Ok(None);
        }

        let limit = self.limit;
        match self
            .waiting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
        {
            Ok(_) => Ok(Some(WaiterGuard(Arc::clone(&self.waiting)))),
            Err(waiting) => {
                tracing::warn!(
                    "MySQL pool exhausted: {} callers waiting (limit {})",
                    waiting,
                    limit
                );
                Err(DatabaseError::PoolExhausted { limit })
            }
        }
    }

    fn waiting(&self) -> u32 {
        self.waiting.load(Ordering::Acquire)
    }
}

/// Decrements the waiter count however the acquire future ends
#[derive(Debug)]
struct WaiterGuard(Arc<AtomicU32>);

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// MySQL connection pool implementation
pub struct MySqlPoolHandle {
    pool: MySqlPool,
    max_connections: u32,
    queue: WaiterGate,
    wait_bounded: bool,
    wait_timeout_secs: u64,
}

impl MySqlPoolHandle {
    pub fn new(pool: MySqlPool, settings: &PoolSettings) -> Self {
        let wait_limit = settings.acquire_timeout.unwrap_or(settings.connect_timeout);
        Self {
            pool,
            max_connections: settings.max_connections,
            queue: WaiterGate::new(settings.queue_limit),
            wait_bounded: settings.acquire_timeout.is_some(),
            wait_timeout_secs: wait_limit.as_secs(),
        }
    }

    /// The underlying sqlx pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn is_saturated(&self) -> bool {
        self.pool.num_idle() == 0 && self.pool.size() >= self.max_connections
    }

    /// Wait for a released connection. Without an acquire timeout, sqlx's
    /// per-attempt deadline expiring on a saturated pool just means nothing
    /// was released yet.
    async fn acquire_waiting(&self) -> DatabaseResult<PoolConnection<MySql>> {
        loop {
            match self.pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(sqlx::Error::PoolTimedOut) if !self.wait_bounded && self.is_saturated() => {
                    tracing::debug!(
                        "Still waiting for a MySQL connection ({} waiting)",
                        self.queue.waiting()
                    );
                }
                Err(e) => return Err(DatabaseError::from_connect(e, self.wait_timeout_secs)),
            }
        }
    }
}

#[async_trait]
impl DatabasePool for MySqlPoolHandle {
    async fn acquire(&self) -> DatabaseResult<Box<dyn DatabaseConnection>> {
        if self.pool.is_closed() {
            return Err(DatabaseError::Closed);
        }

        if let Some(conn) = self.pool.try_acquire() {
            return Ok(Box::new(MySqlPooledConnection { conn: Some(conn) }));
        }

        // Only callers that must wait for a release count against the queue limit
        let _waiter = if self.pool.size() >= self.max_connections {
            self.queue.enter()?
        } else {
            None
        };

        let conn = self.acquire_waiting().await?;

        tracing::trace!(
            "MySQL connection acquired (total: {}, idle: {})",
            self.pool.size(),
            self.pool.num_idle()
        );

        Ok(Box::new(MySqlPooledConnection { conn: Some(conn) }))
    }

    async fn close(&self) -> DatabaseResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn stats(&self) -> DatabasePoolStats {
        DatabasePoolStats::new(self.pool.size(), self.pool.num_idle() as u32)
    }

    fn max_connections(&self) -> u32 {
        self.max_connections
    }
}

/// MySQL connection implementation
pub struct MySqlPooledConnection {
    conn: Option<PoolConnection<MySql>>,
}

impl MySqlPooledConnection {
    fn live(&mut self) -> DatabaseResult<&mut PoolConnection<MySql>> {
        self.conn
            .as_mut()
            .ok_or_else(|| DatabaseError::connection("Connection was invalidated"))
    }
}

#[async_trait]
impl DatabaseConnection for MySqlPooledConnection {
    async fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<QueryResult> {
        let conn = self.live()?;

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let mut result = QueryResult::default();
        let mut columns: Option<Arc<[String]>> = None;

        let mut stream = query.fetch_many(&mut **conn);
        while let Some(item) = stream.try_next().await.map_err(DatabaseError::from_statement)? {
            match item {
                Either::Left(done) => {
                    result.rows_affected += done.rows_affected();
                    if done.last_insert_id() != 0 {
                        result.last_insert_id = Some(done.last_insert_id());
                    }
                }
                Either::Right(row) => {
                    let names = columns
                        .get_or_insert_with(|| {
                            row.columns()
                                .iter()
                                .map(|c| c.name().to_string())
                                .collect::<Vec<_>>()
                                .into()
                        })
                        .clone();
                    result.rows.push(decode_row(&row, names)?);
                }
            }
        }

        Ok(result)
    }

    async fn ping(&mut self) -> DatabaseResult<()> {
        self.live()?
            .ping()
            .await
            .map_err(|e| DatabaseError::connection(format!("Ping failed: {}", e)))
    }

    fn invalidate(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Detaching drops the socket without returning it to the pool
            drop(conn.detach());
        }
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &DatabaseValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::UInt64(u) => query.bind(*u),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(u.hyphenated().to_string()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

fn decode_row(row: &MySqlRow, columns: Arc<[String]>) -> DatabaseResult<Row> {
    let values = (0..row.len())
        .map(|index| mysql_value_to_database_value(row, index, &columns[index]))
        .collect::<DatabaseResult<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

/// Convert a MySQL column value to DatabaseValue
fn mysql_value_to_database_value(
    row: &MySqlRow,
    index: usize,
    column: &str,
) -> DatabaseResult<DatabaseValue> {
    let decode_err = |e: sqlx::Error| DatabaseError::Decode {
        column: column.to_string(),
        message: e.to_string(),
    };

    let raw = row.try_get_raw(index).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let type_name = row.columns()[index].type_info().name();

    let value = match type_name {
        "BOOLEAN" => DatabaseValue::Bool(row.try_get::<bool, _>(index).map_err(decode_err)?),
        name if name.ends_with("UNSIGNED") => {
            DatabaseValue::UInt64(row.try_get_unchecked::<u64, _>(index).map_err(decode_err)?)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            DatabaseValue::Int64(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?)
        }
        "FLOAT" => DatabaseValue::Float64(
            row.try_get_unchecked::<f32, _>(index).map_err(decode_err)? as f64,
        ),
        "DOUBLE" => {
            DatabaseValue::Float64(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?)
        }
        "DATETIME" => {
            let naive: chrono::NaiveDateTime = row.try_get(index).map_err(decode_err)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "TIMESTAMP" => DatabaseValue::DateTime(row.try_get(index).map_err(decode_err)?),
        "DATE" => DatabaseValue::Date(row.try_get(index).map_err(decode_err)?),
        // TIME spans -838:59:59..838:59:59, which NaiveTime cannot always hold
        "TIME" => match row.try_get::<chrono::NaiveTime, _>(index) {
            Ok(time) => DatabaseValue::Time(time),
            Err(_) => text_or_bytes(row, index, column)?,
        },
        "JSON" => DatabaseValue::Json(row.try_get(index).map_err(decode_err)?),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => {
            DatabaseValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(decode_err)?)
        }
        // VARCHAR, CHAR, TEXT, ENUM, SET, DECIMAL and anything else arrive as text
        _ => text_or_bytes(row, index, column)?,
    };

    Ok(value)
}

fn text_or_bytes(row: &MySqlRow, index: usize, column: &str) -> DatabaseResult<DatabaseValue> {
    let bytes = row
        .try_get_unchecked::<Vec<u8>, _>(index)
        .map_err(|e| DatabaseError::Decode {
            column: column.to_string(),
            message: e.to_string(),
        })?;

    Ok(match String::from_utf8(bytes) {
        Ok(text) => DatabaseValue::String(text),
        Err(e) => DatabaseValue::Bytes(e.into_bytes()),
    })
}
