//! Driver registration
//!
//! A process-wide table of named drivers. Registration happens during
//! startup; lookups afterwards take a read lock only.
//!
//! ```rust,ignore
//! cipherbridge_sqlcipher::register_default();
//! let conn = cipherbridge_sqlcipher::driver::open("sqlite3", "app.db?_pragma_key=pw")?;
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::connection::{open_dsn, CipherConnection};
use crate::error::{DriverError, DriverResult};

/// Name the bridge registers itself under
pub const DRIVER_NAME: &str = "sqlite3";

/// Something that turns a connection string into an open connection
pub trait Driver: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Open a connection
    ///
    /// # Errors
    /// Driver-specific; see [`DriverError`].
    fn open(&self, dsn: &str) -> DriverResult<CipherConnection>;
}

/// The configuration bridge as a [`Driver`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCipherDriver;

impl Driver for SqlCipherDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn open(&self, dsn: &str) -> DriverResult<CipherConnection> {
        open_dsn(dsn)
    }
}

type Registry = BTreeMap<String, Arc<dyn Driver>>;

static DRIVERS: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(BTreeMap::new()));
static DEFAULT_REGISTRATION: Once = Once::new();

/// Register the bridge under [`DRIVER_NAME`]
///
/// Safe to call any number of times; only the first call does anything.
pub fn register_default() {
    DEFAULT_REGISTRATION.call_once(|| {
        if register(DRIVER_NAME, Arc::new(SqlCipherDriver)) {
            info!(driver = DRIVER_NAME, "Registered default driver");
        }
    });
}

/// Register `driver` under `name`
///
/// Returns `false` and leaves the table untouched when the name is taken.
pub fn register(name: &str, driver: Arc<dyn Driver>) -> bool {
    let mut drivers = DRIVERS.write();
    if drivers.contains_key(name) {
        warn!(driver = name, "Driver name already registered; keeping existing driver");
        return false;
    }

    drivers.insert(name.to_string(), driver);
    debug!(driver = name, "Registered driver");
    true
}

/// Registered driver names in sorted order
pub fn drivers() -> Vec<String> {
    DRIVERS.read().keys().cloned().collect()
}

/// Look up a registered driver
pub fn get(name: &str) -> Option<Arc<dyn Driver>> {
    DRIVERS.read().get(name).cloned()
}

/// Open `dsn` with the driver registered as `driver_name`
///
/// # Errors
/// Returns [`DriverError::UnknownDriver`] when no such driver exists, or
/// whatever the driver's `open` returns.
pub fn open(driver_name: &str, dsn: &str) -> DriverResult<CipherConnection> {
    let driver = get(driver_name).ok_or_else(|| DriverError::UnknownDriver(driver_name.to_string()))?;
    driver.open(dsn)
}
