//! Database connection pool management.
//!
//! One timeline request holds several connections at once: the collectors
//! query their stores concurrently. The pool is sized against that fan-out.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use leadline_core::{Error, Result};

/// Concurrent store queries issued by one timeline request
/// (tasks, activities, quotes, calls, SMS).
pub const TIMELINE_FANOUT: u32 = 5;

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a free connection, in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a query waits for a connection before failing the request.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pool configuration from environment variables.
    ///
    /// Environment variables:
    ///   DB_MAX_CONNECTIONS      - pool ceiling (default: 10)
    ///   DB_MIN_CONNECTIONS      - connections kept warm (default: 1)
    ///   DB_ACQUIRE_TIMEOUT_SECS - wait for a free connection (default: 5)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build pool configuration from an arbitrary key lookup.
    ///
    /// Missing, unparsable or zero values fall back to defaults. The minimum
    /// never exceeds the maximum.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let parse_positive = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|n| *n > 0)
        };

        let max_connections = parse_positive("DB_MAX_CONNECTIONS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(base.max_connections);
        let min_connections = parse_positive("DB_MIN_CONNECTIONS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(base.min_connections)
            .min(max_connections);
        let acquire_timeout = parse_positive("DB_ACQUIRE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(base.acquire_timeout);

        Self {
            max_connections,
            min_connections,
            acquire_timeout,
        }
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Whether one timeline request can run all its store queries at once.
    pub fn fits_fanout(&self) -> bool {
        self.max_connections >= TIMELINE_FANOUT
    }
}

/// Create a new PostgreSQL connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a new PostgreSQL connection pool with custom configuration.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Creating database connection pool"
    );

    if !config.fits_fanout() {
        warn!(
            subsystem = "database",
            component = "pool",
            max_connections = config.max_connections,
            fanout = TIMELINE_FANOUT,
            "Pool is smaller than one timeline request's fan-out; collectors will queue"
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log current pool health. Warns when no connection is idle, since the next
/// timeline request will wait on acquire.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections, timeline fan-out may queue"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_fits_fanout() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.fits_fanout());
        assert!(!PoolConfig::new().max_connections(2).fits_fanout());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DB_MAX_CONNECTIONS", "24"),
            ("DB_MIN_CONNECTIONS", "4"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "2"),
        ]));
        assert_eq!(config.max_connections, 24);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DB_MAX_CONNECTIONS", "many"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "0"),
            ("DB_MIN_CONNECTIONS", "99999999999"),
        ]));
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_min_never_exceeds_max() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DB_MAX_CONNECTIONS", "3"),
            ("DB_MIN_CONNECTIONS", "8"),
        ]));
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.min_connections, 3);
    }
}
