//! # Structured Logging
//!
//! `tracing` subscriber setup shared by every stockbook binary. `RUST_LOG`
//! overrides the configured filter when set.

use std::io;

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (supports filters like "stockbook_db=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            include_location: false,
            env_filter: Some("stockbook=info,stockbook_db=info,sqlx=warn".to_string()),
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            include_location: true,
            env_filter: Some("stockbook=debug,stockbook_db=debug,sqlx=info".to_string()),
        }
    }

    /// Minimal output for test runs
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            include_location: false,
            env_filter: Some("stockbook_db=error".to_string()),
        }
    }

    /// Preset for a command-line run: `production()` for JSON output,
    /// `development()` for debug builds, plain `default()` otherwise. An
    /// explicit level replaces the preset's filter.
    pub fn for_cli(json_logs: bool, level: Option<&str>) -> Self {
        let config = if json_logs {
            Self::production()
        } else if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::default()
        };

        match level {
            Some(level) => config.with_level(level).with_env_filter(level),
            None => config,
        }
    }

    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// The filter directive used when `RUST_LOG` is not set
    pub fn directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directive()))?;

    let layer = Layer::new()
        .with_writer(io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
    }

    tracing::debug!(
        target: "stockbook::logging",
        "Logging initialized (filter: {}, format: {})",
        config.directive(),
        if config.json_format { "JSON" } else { "text" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_presets() {
        let prod = LoggingConfig::production();
        assert!(prod.json_format);
        assert_eq!(prod.level, "info");

        let dev = LoggingConfig::development();
        assert!(!dev.json_format);
        assert!(dev.include_location);

        assert_eq!(LoggingConfig::test().level, "error");
    }

    #[test]
    fn test_cli_json_uses_production_preset() {
        let config = LoggingConfig::for_cli(true, None);
        assert_eq!(config, LoggingConfig::production());
    }

    #[test]
    fn test_cli_level_overrides_preset_filter() {
        let config = LoggingConfig::for_cli(true, Some("stockbook_db=trace"));
        assert!(config.json_format);
        assert_eq!(config.directive(), "stockbook_db=trace");

        let config = LoggingConfig::for_cli(false, Some("warn"));
        assert!(!config.json_format);
        assert_eq!(config.directive(), "warn");
    }

    #[test]
    fn test_directive_prefers_env_filter() {
        let config = LoggingConfig::default().with_level("warn");
        assert_eq!(config.directive(), "warn");

        let config = config.with_env_filter("stockbook_db=trace");
        assert_eq!(config.directive(), "stockbook_db=trace");
    }
}
