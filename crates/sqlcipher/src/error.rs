//! Driver error types
//!
//! Three failure families reach callers: detection I/O failures,
//! configuration failures (options that cannot be turned into engine
//! directives) and connection failures (the engine refused to open, or the
//! validating round-trip failed because of a wrong key or an incompatible
//! cipher revision). The remaining variants belong to the registration and
//! pooling glue.

use std::path::PathBuf;

use cipherbridge_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Driver error type
#[derive(Debug, Error)]
pub enum DriverError {
    /// The file exists but could not be opened or read.
    #[error("I/O error inspecting '{path}': {source}")]
    Io {
        /// File being inspected
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// An option could not be turned into an engine directive.
    #[error("Invalid connection option: {0}")]
    Configuration(String),

    /// The engine open or the validating round-trip failed.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// No driver is registered under the requested name.
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// The connection pool could not hand out a connection.
    #[error(transparent)]
    Pool(#[from] r2d2::Error),

    /// Shared error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Driver result type
pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    /// Configuration error naming the offending option
    pub fn invalid_option(option: &str, message: impl std::fmt::Display) -> Self {
        Self::Configuration(format!("{option}: {message}"))
    }

    /// Connection error carrying the engine's message
    pub fn engine(context: &str, err: &rusqlite::Error) -> Self {
        Self::Connection(format!("{context}: {err}"))
    }

    /// Detection I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl ErrorClassification for DriverError {
    /// Failures are reported once; nothing here is retried automatically.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Error,
            Self::Connection(_) => ErrorSeverity::Error,
            Self::UnknownDriver(_) => ErrorSeverity::Error,
            Self::Pool(_) => ErrorSeverity::Error,
            Self::Common(err) => err.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Common(err) if err.is_critical())
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}

/// Convert DriverError to CommonError for callers that only speak the shared
/// taxonomy
impl From<DriverError> for CommonError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Common(common_err) => common_err,
            DriverError::Configuration(message) => CommonError::config(message),
            DriverError::UnknownDriver(name) => CommonError::not_found_with_id("driver", name),
            DriverError::Io { path, source } => {
                CommonError::persistence_op("classify", format!("{}: {source}", path.display()))
            }
            other => CommonError::storage_op("open", other.to_string()),
        }
    }
}
