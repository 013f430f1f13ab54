//! Connection pooling
//!
//! r2d2 glue around the configuration bridge. Every pooled connection goes
//! through the same open path as a direct open: cipher directives, the
//! validating round-trip, then tuning. Checkout re-runs the round-trip.

use std::time::Duration;

use r2d2::{ManageConnection, Pool};
use tracing::{info, instrument, warn};

use crate::connection::{open_configured, CipherConnection};
use crate::dsn::{ConnectionOptions, Dsn};
use crate::error::{DriverError, DriverResult};

/// Pool of configured connections
pub type CipherPool = Pool<CipherConnectionManager>;

/// Pool sizing and timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// Connections kept idle (defaults to `max_size` when unset)
    pub min_idle: Option<u32>,

    /// How long a checkout waits for a free connection
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_size: 10, min_idle: None, connection_timeout: Duration::from_secs(5) }
    }
}

/// r2d2 manager that opens connections through the bridge
#[derive(Debug, Clone)]
pub struct CipherConnectionManager {
    path: String,
    options: ConnectionOptions,
}

impl CipherConnectionManager {
    /// Manager for `path` opened with `options`
    pub fn new(path: impl Into<String>, options: ConnectionOptions) -> Self {
        Self { path: path.into(), options }
    }

    /// Manager for a connection string
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] for an empty path.
    pub fn from_dsn(dsn: &str) -> DriverResult<Self> {
        let (path, options) = Dsn::parse(dsn)?.into_parts();
        Ok(Self::new(path, options))
    }

    /// Database path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ManageConnection for CipherConnectionManager {
    type Connection = CipherConnection;
    type Error = DriverError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        open_configured(&self.path, &self.options)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.validate()
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Build a pool for `dsn`
///
/// One connection is opened up front so a wrong key or malformed option
/// fails here instead of after the pool's connection timeout.
///
/// # Errors
/// Returns the bridge error from the probe connection, or
/// [`DriverError::Pool`] when r2d2 cannot fill the pool.
#[instrument(skip_all, fields(pool_size = config.max_size))]
pub fn build_pool(dsn: &str, config: &PoolConfig) -> DriverResult<CipherPool> {
    let manager = CipherConnectionManager::from_dsn(dsn)?;
    let path = manager.path().to_string();

    let probe = manager.connect()?;
    if let Err(e) = probe.close() {
        warn!(error = %e, "Failed to close probe connection");
    }

    let pool = Pool::builder()
        .max_size(config.max_size)
        .min_idle(config.min_idle)
        .connection_timeout(config.connection_timeout)
        .test_on_check_out(true)
        .build(manager)?;

    info!(path = %path, "Connection pool created with {} connections", config.max_size);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    //! Unit tests for pool.
    use tempfile::TempDir;

    use super::*;

    /// Tests the default pool configuration values.
    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();

        assert_eq!(config.max_size, 10, "Default pool size should be 10");
        assert_eq!(config.min_idle, None);
        assert_eq!(
            config.connection_timeout,
            Duration::from_secs(5),
            "Default connection timeout should be 5 seconds"
        );
    }

    /// Validates that pooled connections share one encrypted database.
    ///
    /// Assertions:
    /// - Data written through one checkout is visible through another.
    /// - Every checkout reports itself encrypted.
    #[test]
    fn test_pool_shares_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("pooled.db");
        let dsn = format!("{}?_pragma_key=pool-secret&_journal_mode=WAL", db_path.display());
        let config = PoolConfig { max_size: 2, ..PoolConfig::default() };

        let pool = build_pool(&dsn, &config).unwrap();
        {
            let conn = pool.get().unwrap();
            assert!(conn.is_encrypted());
            conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);").unwrap();
        }

        let conn = pool.get().unwrap();
        let v: i64 = conn.query_row("SELECT v FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(v, 7);
    }

    /// Validates that a wrong key fails fast with a connection error.
    #[test]
    fn test_wrong_key_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("locked.db");
        let created =
            crate::connection::open_dsn(&format!("{}?_pragma_key=right", db_path.display())).unwrap();
        created.execute_batch("CREATE TABLE t (id INTEGER);").unwrap();
        created.close().unwrap();

        let dsn = format!("{}?_pragma_key=wrong", db_path.display());
        let result = build_pool(&dsn, &PoolConfig::default());
        assert!(matches!(result, Err(DriverError::Connection(_))));
    }

    /// Validates that an exhausted pool fails the checkout as an error.
    ///
    /// Assertions:
    /// - A second checkout from a single-connection pool times out.
    /// - The timeout converts to `DriverError::Pool` with `Error` severity.
    #[test]
    fn test_exhausted_pool_is_error() {
        use cipherbridge_common::error::{ErrorClassification, ErrorSeverity};

        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("single.db");
        let config = PoolConfig {
            max_size: 1,
            connection_timeout: Duration::from_millis(100),
            ..PoolConfig::default()
        };
        let pool = build_pool(&format!("{}?_pragma_key=pw", db_path.display()), &config).unwrap();

        let _held = pool.get().unwrap();
        let err = DriverError::from(pool.get().unwrap_err());

        assert!(matches!(err, DriverError::Pool(_)));
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    /// Validates manager construction from a connection string.
    #[test]
    fn test_manager_from_dsn() {
        let manager = CipherConnectionManager::from_dsn("file:app.db?_pragma_key=pw").unwrap();
        assert_eq!(manager.path(), "app.db");
        assert!(CipherConnectionManager::from_dsn("?_pragma_key=pw").is_err());
    }
}
