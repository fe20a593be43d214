//! Configuration management.
//!
//! Values come from an optional file plus `RBAC__`-prefixed environment
//! variables, e.g. `RBAC__DATABASE__URL=sqlite://data/rbac.db`.

use serde::Deserialize;

use crate::error::Result;
use crate::telemetry::LoggingConfig;

const ENV_PREFIX: &str = "RBAC";

/// Main configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite connection URL
    pub url: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of pooled connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations when connecting
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// Configuration for `url` with every other field at its default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            run_migrations: default_run_migrations(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 { 5 }
fn default_min_connections() -> u32 { 1 }
fn default_acquire_timeout_secs() -> u64 { 5 }
fn default_run_migrations() -> bool { true }

impl Config {
    /// Load configuration from `.env` and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::telemetry::LogFormat;
    use std::io::Write;

    #[test]
    fn test_database_defaults() {
        let cfg = DatabaseConfig::with_url("sqlite::memory:");

        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.min_connections, 1);
        assert_eq!(cfg.acquire_timeout_secs, 5);
        assert!(cfg.run_migrations);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite://rbac.db"
max_connections = 8

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(cfg.database.url, "sqlite://rbac.db");
        assert_eq!(cfg.database.max_connections, 8);
        assert_eq!(cfg.database.min_connections, 1);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let error = Config::from_file("/nonexistent/rbac-config").unwrap_err();
        assert_eq!(error.code().category(), "configuration");
        assert_ne!(error.code(), ErrorCode::InternalError);
        assert!(std::error::Error::source(&error).is_some());
    }
}
