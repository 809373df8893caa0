//! Database configuration
//!
//! Connection parameters are read once at process start into
//! [`DatabaseConfig`] and handed to the manager. Pool tuning lives in
//! [`PoolSettings`], whose defaults are the fixed production values.

use std::env;
use std::fmt;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration '{field}': {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value '{value}' for '{field}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Fixed pool parameters
pub struct PoolDefaults;

impl PoolDefaults {
    pub const PORT: u16 = 3306;
    pub const MAX_CONNECTIONS: u32 = 10;
    /// 0 means waiters are never rejected
    pub const QUEUE_LIMIT: u32 = 0;
    pub const KEEP_ALIVE: bool = true;
    pub const KEEP_ALIVE_INITIAL_DELAY_MS: u64 = 10_000;
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;
    pub const PROBE_TIMEOUT_MS: u64 = 5_000;
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
}

/// Connection parameters for the MySQL server
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            port: PoolDefaults::PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Load from `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and `DB_PORT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup instead of the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ConfigError::MissingRequired {
                field: key.to_string(),
                hint: format!("{} environment variable must be set", key),
            })
        };

        let host = required("DB_HOST")?;
        let user = required("DB_USER")?;
        let password = required("DB_PASSWORD")?;
        let database = required("DB_NAME")?;

        let port = match lookup("DB_PORT") {
            None => PoolDefaults::PORT,
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(
                    "DB_PORT value '{}' is not a valid port, using default {}",
                    raw,
                    PoolDefaults::PORT
                );
                PoolDefaults::PORT
            }),
        };

        let config = Self {
            host,
            user,
            password,
            database,
            port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("DB_HOST", &self.host),
            ("DB_USER", &self.user),
            ("DB_NAME", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                    expected: "a non-empty string".to_string(),
                });
            }
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DB_PORT".to_string(),
                value: self.port.to_string(),
                expected: "port between 1 and 65535".to_string(),
            });
        }

        Ok(())
    }

    /// `user@host:port/database`, safe to log
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

/// Pool and manager tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub queue_limit: u32,
    pub keep_alive: bool,
    pub keep_alive_initial_delay: Duration,
    pub connect_timeout: Duration,
    /// How long a caller waits for a busy pool to free a connection.
    /// `None` waits until one is released.
    pub acquire_timeout: Option<Duration>,
    pub probe_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub statement_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: PoolDefaults::MAX_CONNECTIONS,
            queue_limit: PoolDefaults::QUEUE_LIMIT,
            keep_alive: PoolDefaults::KEEP_ALIVE,
            keep_alive_initial_delay: Duration::from_millis(
                PoolDefaults::KEEP_ALIVE_INITIAL_DELAY_MS,
            ),
            connect_timeout: Duration::from_millis(PoolDefaults::CONNECT_TIMEOUT_MS),
            acquire_timeout: None,
            probe_timeout: Duration::from_millis(PoolDefaults::PROBE_TIMEOUT_MS),
            shutdown_timeout: Duration::from_millis(PoolDefaults::SHUTDOWN_TIMEOUT_MS),
            statement_timeout: None,
        }
    }
}

impl PoolSettings {
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_queue_limit(mut self, queue_limit: u32) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool, initial_delay: Duration) -> Self {
        self.keep_alive = enabled;
        self.keep_alive_initial_delay = initial_delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }
}
