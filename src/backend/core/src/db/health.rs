//! Database health: connectivity probe, pool metrics and migration status.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::Database;
use crate::error::Result;

/// Latency above which a connectivity probe is logged as slow.
const SLOW_PROBE_THRESHOLD: Duration = Duration::from_millis(100);

/// Metrics collected from the database connection pool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionPoolMetrics {
    /// Total connections in the pool.
    pub pool_size: u32,
    /// Number of idle connections.
    pub idle_connections: u32,
    /// Number of active (in-use) connections.
    pub active_connections: u32,
    /// Maximum configured pool size.
    pub max_connections: u32,
}

/// Result of migration validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MigrationValidationResult {
    /// Whether every embedded migration has been applied.
    pub is_current: bool,
    /// Versions recorded as successfully applied.
    pub applied_versions: Vec<i64>,
    /// Embedded versions not yet applied.
    pub pending_versions: Vec<i64>,
    pub validated_at: DateTime<Utc>,
}

/// Snapshot returned by [`Database::health_check`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseHealth {
    pub reachable: bool,
    pub latency_ms: u64,
    pub pool: ConnectionPoolMetrics,
    pub checked_at: DateTime<Utc>,
}

impl Database {
    /// Check database connectivity by executing a simple query.
    pub async fn check_connectivity(&self) -> Result<Duration> {
        let start = Instant::now();
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                error!(error = %e, "Database connectivity check failed");
                e
            })?;
        let latency = start.elapsed();
        if latency > SLOW_PROBE_THRESHOLD {
            warn!(
                latency_ms = latency.as_millis() as u64,
                "Database connectivity check latency is high"
            );
        }
        Ok(latency)
    }

    /// Get connection pool metrics.
    pub fn pool_metrics(&self) -> ConnectionPoolMetrics {
        let pool_size = self.pool().size();
        let idle = self.pool().num_idle() as u32;

        ConnectionPoolMetrics {
            pool_size,
            idle_connections: idle,
            active_connections: pool_size.saturating_sub(idle),
            max_connections: self.max_connections,
        }
    }

    /// Probe the store and report pool state.
    ///
    /// An unreachable store is reported in the snapshot rather than as an error.
    pub async fn health_check(&self) -> DatabaseHealth {
        let (reachable, latency) = match self.check_connectivity().await {
            Ok(latency) => (true, latency),
            Err(_) => (false, Duration::ZERO),
        };

        DatabaseHealth {
            reachable,
            latency_ms: latency.as_millis() as u64,
            pool: self.pool_metrics(),
            checked_at: Utc::now(),
        }
    }

    /// Compare applied migrations against the ones embedded in the binary.
    pub async fn validate_migrations(&self) -> Result<MigrationValidationResult> {
        let applied: Vec<i64> = sqlx::query_scalar(
            "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
        )
        .fetch_all(self.pool())
        .await?;

        let pending: Vec<i64> = Self::migrator()
            .iter()
            .map(|m| m.version)
            .filter(|v| !applied.contains(v))
            .collect();

        let result = MigrationValidationResult {
            is_current: pending.is_empty(),
            applied_versions: applied,
            pending_versions: pending,
            validated_at: Utc::now(),
        };

        if result.is_current {
            info!(
                applied_count = result.applied_versions.len(),
                "All database migrations are applied"
            );
        } else {
            warn!(
                pending_count = result.pending_versions.len(),
                "Database has pending migrations"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_reports_reachable() {
        let db = Database::connect_url("sqlite::memory:").await.unwrap();
        let health = db.health_check().await;

        assert!(health.reachable);
        assert_eq!(health.pool.max_connections, 1);
    }

    #[tokio::test]
    async fn test_migrations_are_current_after_connect() {
        let db = Database::connect_url("sqlite::memory:").await.unwrap();
        let result = db.validate_migrations().await.unwrap();

        assert!(result.is_current);
        assert!(result.pending_versions.is_empty());
        assert!(!result.applied_versions.is_empty());
    }
}
