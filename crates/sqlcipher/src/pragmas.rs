//! Connection tuning pragmas
//!
//! Applied after the validating round-trip, since the engine needs a
//! readable database to switch journal modes:
//! - busy timeout for lock contention (default 5s)
//! - foreign key enforcement
//! - journal mode
//! - synchronous level

use std::fmt;
use std::time::Duration;

use rusqlite::Connection;

use crate::dsn::{parse_bool, ConnectionOptions, OptionKind};
use crate::error::{DriverError, DriverResult};

/// Busy timeout used when the connection string does not set one
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// `PRAGMA journal_mode` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Rollback journal deleted at commit
    Delete,
    /// Rollback journal truncated at commit
    Truncate,
    /// Rollback journal header zeroed at commit
    Persist,
    /// Rollback journal kept in memory
    Memory,
    /// Write-ahead log
    Wal,
    /// No journal
    Off,
}

impl JournalMode {
    fn parse(value: &str) -> DriverResult<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "TRUNCATE" => Ok(Self::Truncate),
            "PERSIST" => Ok(Self::Persist),
            "MEMORY" => Ok(Self::Memory),
            "WAL" => Ok(Self::Wal),
            "OFF" => Ok(Self::Off),
            _ => Err(DriverError::invalid_option(
                OptionKind::JournalMode.name(),
                format!("unknown journal mode '{value}'"),
            )),
        }
    }

    /// Pragma keyword
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `PRAGMA synchronous` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synchronous {
    /// 0
    Off,
    /// 1
    Normal,
    /// 2
    Full,
    /// 3
    Extra,
}

impl Synchronous {
    fn parse(value: &str) -> DriverResult<Self> {
        match value.to_ascii_uppercase().as_str() {
            "OFF" | "0" => Ok(Self::Off),
            "NORMAL" | "1" => Ok(Self::Normal),
            "FULL" | "2" => Ok(Self::Full),
            "EXTRA" | "3" => Ok(Self::Extra),
            _ => Err(DriverError::invalid_option(
                OptionKind::Synchronous.name(),
                format!("unknown synchronous level '{value}'"),
            )),
        }
    }

    /// Pragma keyword
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }
}

/// Per-connection tuning decoded from the connection string
///
/// Unset fields keep the engine default, except the busy timeout which
/// falls back to [`DEFAULT_BUSY_TIMEOUT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTuning {
    /// Busy timeout
    pub busy_timeout: Duration,
    /// Foreign key enforcement
    pub foreign_keys: Option<bool>,
    /// Journal mode
    pub journal_mode: Option<JournalMode>,
    /// Synchronous level
    pub synchronous: Option<Synchronous>,
}

impl Default for ConnectionTuning {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: None,
            journal_mode: None,
            synchronous: None,
        }
    }
}

impl ConnectionTuning {
    /// Decode tuning options
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] for malformed values.
    pub fn from_options(options: &ConnectionOptions) -> DriverResult<Self> {
        let mut tuning = Self::default();

        if let Some(value) = options.get(OptionKind::BusyTimeout) {
            let millis: u64 = value.parse().map_err(|_| {
                DriverError::invalid_option(
                    OptionKind::BusyTimeout.name(),
                    format!("'{value}' is not a number of milliseconds"),
                )
            })?;
            tuning.busy_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = options.get(OptionKind::ForeignKeys) {
            tuning.foreign_keys = Some(parse_bool(OptionKind::ForeignKeys.name(), value)?);
        }
        if let Some(value) = options.get(OptionKind::JournalMode) {
            tuning.journal_mode = Some(JournalMode::parse(value)?);
        }
        if let Some(value) = options.get(OptionKind::Synchronous) {
            tuning.synchronous = Some(Synchronous::parse(value)?);
        }

        Ok(tuning)
    }

    /// Pragma batch for the non-timeout settings
    pub fn pragma_batch(&self) -> String {
        let mut pragma_sql = String::new();

        if let Some(mode) = self.journal_mode {
            pragma_sql.push_str(&format!("PRAGMA journal_mode={mode};\n"));
        }
        if let Some(level) = self.synchronous {
            pragma_sql.push_str(&format!("PRAGMA synchronous={};\n", level.as_str()));
        }
        if let Some(enabled) = self.foreign_keys {
            pragma_sql.push_str(&format!("PRAGMA foreign_keys={};\n", if enabled { "ON" } else { "OFF" }));
        }

        pragma_sql
    }

    /// Apply the tuning to an open, validated connection
    ///
    /// # Errors
    /// Returns [`DriverError::Connection`] when the engine rejects a pragma.
    pub fn apply(&self, conn: &Connection) -> DriverResult<()> {
        let pragma_sql = self.pragma_batch();
        if !pragma_sql.is_empty() {
            conn.execute_batch(&pragma_sql)
                .map_err(|e| DriverError::engine("failed to apply pragmas", &e))?;
        }

        // Separate call as it takes a parameter
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| DriverError::engine("failed to set busy timeout", &e))?;

        Ok(())
    }
}
