//! Database layer for the RBAC store.
//!
//! Uses SQLite through sqlx. The schema lives in `migrations/` and is embedded
//! at compile time; [`Database::migrate`] must run before any repository call.

mod health;

pub use health::{ConnectionPoolMetrics, DatabaseHealth, MigrationValidationResult};

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// The sqlx backend every query in this crate is written against.
pub type Db = sqlx::Sqlite;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database connection pool and schema management.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    max_connections: u32,
}

impl Database {
    /// Open a connection pool from configuration.
    ///
    /// In-memory URLs are pinned to a single, never-recycled connection since
    /// every SQLite connection would otherwise see its own empty database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        let max_connections = if is_in_memory(&config.url) {
            if config.max_connections > 1 {
                warn!(
                    url = %config.url,
                    requested = config.max_connections,
                    "In-memory database limited to a single connection"
                );
            }
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            1
        } else {
            pool_options = pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections);
            config.max_connections
        };

        let pool = pool_options.connect_with(options).await?;
        info!(url = %config.url, max_connections, "Database pool opened");

        let database = Self {
            pool,
            max_connections,
        };
        if config.run_migrations {
            database.migrate().await?;
        }
        Ok(database)
    }

    /// Open a pool from a bare URL with default settings.
    pub async fn connect_url(url: &str) -> Result<Self> {
        Self::connect(&DatabaseConfig::with_url(url)).await
    }

    /// Run migrations. Creates the role, permission and join tables.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!(
            migrations = MIGRATOR.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) fn migrator() -> &'static Migrator {
        &MIGRATOR
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
