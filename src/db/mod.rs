//! PostgreSQL connection pooling and storage-error classification.
//!
//! The managers all hold an `Arc<PgPool>` and issue their own SQL; this
//! module gives them the pool plus the shared conflict classifiers:
//! unique-constraint violations become domain-level duplicate errors, and
//! transient contention (serialization failures, deadlocks, lock-wait
//! timeouts) becomes a retryable conflict, distinct from business-rule
//! rejections.

use sqlx::error::ErrorKind;
use sqlx::postgres::PgPool;

pub mod config;
pub mod schema;

pub use config::DatabaseConfig;
pub use schema::ensure_schema;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect a pool using the given configuration.
    ///
    /// ```no_run
    /// use tourney_engine::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::from_env()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = config.pool_options().connect(&config.database_url).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Whether an error is a unique-constraint violation.
///
/// The partial unique index over active enrollments is the authoritative
/// duplicate guard; callers translate this into their own duplicate error
/// instead of surfacing the raw storage error.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().map(|e| e.kind()),
        Some(ErrorKind::UniqueViolation)
    )
}

/// Whether an error is transient store-level contention worth one retry.
///
/// Covers serialization failures (40001), deadlocks (40P01) and lock-wait
/// timeouts (55P03). Business-rule rejections never classify as transient.
pub fn is_transient_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        _ => err
            .as_database_error()
            .and_then(|e| e.code())
            .is_some_and(|code| matches!(code.as_ref(), "40001" | "40P01" | "55P03")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(is_transient_conflict(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_row_not_found_is_not_transient() {
        assert!(!is_transient_conflict(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_connect_and_health_check() {
        // Skips when no test database is configured.
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };

        let config = DatabaseConfig {
            database_url,
            ..DatabaseConfig::development()
        };
        let db = Database::new(&config)
            .await
            .expect("Failed to connect to database");
        db.health_check().await.expect("Health check failed");
        db.close().await;
    }
}
