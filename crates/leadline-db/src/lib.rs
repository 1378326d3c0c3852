//! # leadline-db
//!
//! PostgreSQL access layer for leadline.
//!
//! This crate provides:
//! - Connection pool management
//! - SQL rendering of the OR'd correlation predicates
//! - `PgTimelineStore`, the [`TimelineStore`] over the CRM tables
//!
//! Tables that do not exist in a deployment surface as
//! `Error::NotProvisioned`, which the timeline treats as an empty source.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use leadline_db::{Database, TimelineConfig, TimelineEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/leadline").await?;
//!     let engine = TimelineEngine::new(Arc::new(db.timeline.clone()), TimelineConfig::default());
//!     Ok(())
//! }
//! ```
pub mod pool;
pub mod predicates;
pub mod store;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use leadline_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use predicates::{build_filter, FilterResult, QueryParam, ScopeColumns, SqlPredicate};
pub use store::PgTimelineStore;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Read access to the CRM stores the timeline correlates against.
    pub timeline: PgTimelineStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            timeline: PgTimelineStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\tmp"), "c:\\\\tmp");
    }
}
