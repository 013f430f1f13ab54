//! Configuration bridge
//!
//! Opens an engine handle and configures it from connection options in the
//! fixed order the cipher needs: cipher directives before the first read,
//! then a validating round-trip that forces page 1 to be decrypted, then
//! connection tuning. A handle that fails any step is closed before the
//! error is returned, so callers never see a half-configured connection.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use tracing::{debug, error, info, instrument, warn};

use crate::cipher::CipherPlan;
use crate::dsn::{escape_uri_path, ConnectionOptions, Dsn};
use crate::error::{DriverError, DriverResult};
use crate::pragmas::ConnectionTuning;

/// Query every fresh handle must answer before it is handed out
pub const VALIDATION_QUERY: &str = "SELECT count(*) FROM sqlite_master";

/// A configured engine handle
///
/// Derefs to [`rusqlite::Connection`]. Dropping it closes the handle;
/// [`close`](Self::close) does the same but reports failures.
pub struct CipherConnection {
    inner: RusqliteConnection,
    path: String,
    encrypted: bool,
}

impl CipherConnection {
    /// Path the connection was opened on
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a key was applied to this connection
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Run the validating round-trip again
    ///
    /// # Errors
    /// Returns [`DriverError::Connection`] when the database can no longer
    /// be read with this handle's key.
    pub fn validate(&self) -> DriverResult<()> {
        validate(&self.inner, self.encrypted)
    }

    /// Close the handle, reporting engine failures
    ///
    /// # Errors
    /// Returns [`DriverError::Connection`] when the engine refuses to close
    /// (the handle is dropped regardless).
    pub fn close(self) -> DriverResult<()> {
        self.inner.close().map_err(|(_, e)| DriverError::engine("failed to close connection", &e))
    }
}

impl std::fmt::Debug for CipherConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherConnection")
            .field("path", &self.path)
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

// Allow using CipherConnection as RusqliteConnection
impl Deref for CipherConnection {
    type Target = RusqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for CipherConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Open `path` and configure it from `options`
///
/// # Errors
/// - [`DriverError::Configuration`] when the options cannot be turned into
///   directives; nothing is opened in that case.
/// - [`DriverError::Connection`] when the engine open, a directive or the
///   validating round-trip fails (wrong key, incompatible cipher revision,
///   not a database).
#[instrument(skip_all, fields(path = %path))]
pub fn open_configured(path: &str, options: &ConnectionOptions) -> DriverResult<CipherConnection> {
    let start = Instant::now();

    let plan = CipherPlan::from_options(options)?;
    let tuning = ConnectionTuning::from_options(options)?;
    let encrypted = !plan.is_plaintext();

    if !encrypted {
        debug!("No key supplied; opening without encryption");
    }

    let target = engine_target(path, options);
    let conn = RusqliteConnection::open_with_flags(&target, OpenFlags::default()).map_err(|e| {
        error!(error = %e, "Engine refused to open database");
        DriverError::engine("failed to open database", &e)
    })?;

    if let Err(err) = configure(&conn, &plan, &tuning) {
        release(conn);
        return Err(err);
    }

    info!(
        encrypted,
        duration_ms = start.elapsed().as_millis(),
        "Database connection opened"
    );
    Ok(CipherConnection { inner: conn, path: path.to_string(), encrypted })
}

/// Parse a connection string and open it
///
/// # Errors
/// Same as [`open_configured`], plus [`DriverError::Configuration`] for an
/// empty path.
pub fn open_dsn(dsn: &str) -> DriverResult<CipherConnection> {
    let dsn = Dsn::parse(dsn)?;
    open_configured(dsn.path(), dsn.options())
}

fn configure(
    conn: &RusqliteConnection,
    plan: &CipherPlan,
    tuning: &ConnectionTuning,
) -> DriverResult<()> {
    plan.apply(conn)?;
    validate(conn, !plan.is_plaintext())?;
    tuning.apply(conn)
}

fn validate(conn: &RusqliteConnection, encrypted: bool) -> DriverResult<()> {
    conn.query_row(VALIDATION_QUERY, [], |row| row.get::<_, i64>(0)).map(|_| ()).map_err(|e| {
        error!(error = %e, encrypted, "Validation query failed");
        let context = if encrypted {
            "cannot read database (wrong key or incompatible cipher settings)"
        } else {
            "cannot read database (encrypted or not a database)"
        };
        DriverError::engine(context, &e)
    })
}

fn release(conn: RusqliteConnection) {
    if let Err((_, e)) = conn.close() {
        warn!(error = %e, "Failed to close connection after setup failure");
    }
}

// Unknown options travel to the engine as URI query parameters.
fn engine_target(path: &str, options: &ConnectionOptions) -> String {
    let passthrough = options.passthrough();
    if passthrough.is_empty() {
        return path.to_string();
    }

    let query: Vec<String> = passthrough
        .iter()
        .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
        .collect();
    format!("file:{}?{}", escape_uri_path(path), query.join("&"))
}
