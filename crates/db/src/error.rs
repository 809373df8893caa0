//! Error types for connection management
//!
//! Every variant carries owned strings so the type is `Clone`: a failed pool
//! creation is delivered to every caller that was waiting on it.

use crate::config::ConfigError;

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error types for pool lifecycle and statement execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum DatabaseError {
    /// Pool creation or connection checkout failed
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    /// Pool creation or liveness probe did not finish in time
    #[error("Database connection timeout after {timeout_secs}s")]
    ConnectionTimeout { timeout_secs: u64 },

    /// A bound statement failed after a connection was obtained
    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        code: Option<String>,
    },

    #[error("Statement timed out after {timeout_ms}ms")]
    StatementTimeout { timeout_ms: u64 },

    #[error("Pool exhausted: {limit} callers already waiting for a connection")]
    PoolExhausted { limit: u32 },

    #[error("Connection manager is shut down")]
    Closed,

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DatabaseError {
    pub fn connection(message: impl Into<String>) -> Self {
        DatabaseError::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        DatabaseError::QueryExecution {
            message: message.into(),
            code: None,
        }
    }

    /// Pool could not be built or reached
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::Connection { .. }
                | DatabaseError::ConnectionTimeout { .. }
                | DatabaseError::PoolExhausted { .. }
                | DatabaseError::Closed
                | DatabaseError::Configuration(_)
        )
    }

    /// A statement failed on an obtained connection
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::QueryExecution { .. } | DatabaseError::StatementTimeout { .. }
        )
    }

    /// Wrap a driver error raised while building a pool or checking out a connection
    pub(crate) fn from_connect(err: sqlx::Error, connect_timeout_secs: u64) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::ConnectionTimeout {
                timeout_secs: connect_timeout_secs,
            },
            sqlx::Error::PoolClosed => DatabaseError::Closed,
            other => DatabaseError::connection(other.to_string()),
        }
    }

    /// Wrap a driver error raised by a bound statement
    pub(crate) fn from_statement(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };
        DatabaseError::QueryExecution {
            message: err.to_string(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DatabaseError::connection("refused").is_connection_error());
        assert!(DatabaseError::ConnectionTimeout { timeout_secs: 10 }.is_connection_error());
        assert!(DatabaseError::Closed.is_connection_error());
        assert!(!DatabaseError::Closed.is_query_error());

        assert!(DatabaseError::query("syntax").is_query_error());
        assert!(DatabaseError::StatementTimeout { timeout_ms: 50 }.is_query_error());
        assert!(!DatabaseError::query("syntax").is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let timeout = DatabaseError::ConnectionTimeout { timeout_secs: 10 };
        assert!(timeout.to_string().contains("10s"));

        let exhausted = DatabaseError::PoolExhausted { limit: 4 };
        assert!(exhausted.to_string().contains("exhausted"));

        let query = DatabaseError::query("Duplicate entry");
        assert_eq!(query.to_string(), "Query execution failed: Duplicate entry");
    }

    #[test]
    fn test_driver_error_mapping() {
        let timeout = DatabaseError::from_connect(sqlx::Error::PoolTimedOut, 10);
        assert!(matches!(timeout, DatabaseError::ConnectionTimeout { timeout_secs: 10 }));

        let closed = DatabaseError::from_connect(sqlx::Error::PoolClosed, 10);
        assert!(matches!(closed, DatabaseError::Closed));

        let statement = DatabaseError::from_statement(sqlx::Error::RowNotFound);
        assert!(matches!(statement, DatabaseError::QueryExecution { code: None, .. }));
    }
}
