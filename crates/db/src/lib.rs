//! # stockbook-db: Database Connection Management for stockbook
//!
//! One [`ConnectionManager`] per process owns a MySQL connection pool. The
//! pool is created on first use, probed before every hand-out and rebuilt
//! when the probe fails. Concurrent callers that find no usable pool wait on
//! a single creation instead of racing to build their own.
//!
//! Statements run through [`ConnectionManager::run_query`] with positional
//! `?` placeholders; values are always bound, never spliced into SQL.

pub mod backends;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod row;
pub mod value;


pub use backends::{
    same_pool, DatabaseBackend, DatabaseConnection, DatabasePool, DatabasePoolStats,
    MySqlBackend,
};
pub use config::{ConfigError, DatabaseConfig, PoolDefaults, PoolSettings};
pub use error::{DatabaseError, DatabaseResult};
pub use lifecycle::{run_until_shutdown, shutdown_signal};
pub use logging::{init_logging, LoggingConfig};
pub use manager::{ConnectionManager, ManagerStats, PoolHandle, PoolPhase};
pub use row::{QueryResult, Row};
pub use value::DatabaseValue;
