//! Common error types shared by the cipherbridge crates
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: error patterns that show up in more than one crate
//!    (configuration, serialization, persistence, lookup, storage).
//!
//! 2. **`ErrorClassification` trait**: a standard interface for asking an
//!    error whether it is retryable, how severe it is and whether it is
//!    critical.
//!
//! 3. **`ErrorSeverity` enum**: a unified severity scale used when logging.
//!
//! Crate-specific errors compose with `CommonError` instead of duplicating its
//! variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum DriverError {
//!     #[error("Invalid connection option: {0}")]
//!     Configuration(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! | Level        | Use Case                            |
//! |--------------|-------------------------------------|
//! | **Info**     | Expected conditions, nothing failed |
//! | **Warning**  | Degraded but operational            |
//! | **Error**    | The requested operation failed      |
//! | **Critical** | Integrity or key material at risk   |

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across crates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Data persistence errors (file I/O)
    Persistence { message: String, operation: Option<String> },

    /// Resource not found errors
    NotFound { resource_type: String, identifier: Option<String> },

    /// Storage engine errors
    Storage { message: String, operation: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
            Self::NotFound { resource_type, identifier } => {
                if let Some(id) = identifier {
                    write!(f, "{} not found: '{}'", resource_type, id)
                } else {
                    write!(f, "{} not found", resource_type)
                }
            }
            Self::Storage { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Storage error during '{}': {}", op, message)
                } else {
                    write!(f, "Storage error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    /// Nothing in this family is transient; callers decide on retries.
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } => ErrorSeverity::Error,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Persistence { .. } => ErrorSeverity::Error,
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Storage { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create a not found error with identifier
    pub fn not_found_with_id<T: Into<String>, I: Into<String>>(
        resource_type: T,
        identifier: I,
    ) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: Some(identifier.into()) }
    }

    /// Create a storage error for a specific operation
    pub fn storage_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Storage { message: message.into(), operation: Some(operation.into()) }
    }
}

/// Error classification trait for consistent error handling across crates
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again. Nothing in this workspace retries on its own; the flag is for
    /// callers.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates the Display output of the variants the driver produces.
    #[test]
    fn test_display() {
        let err = CommonError::config("missing path");
        assert_eq!(err.to_string(), "Configuration error: missing path");

        let err = CommonError::serialization_format("TOML", "expected a value");
        assert_eq!(err.to_string(), "Serialization error (TOML): expected a value");

        let err = CommonError::persistence_op("read_config", "denied");
        assert_eq!(err.to_string(), "Persistence error during 'read_config': denied");
    }

    /// Validates severity and criticality of the common variants.
    ///
    /// Assertions:
    /// - `NotFound` is informational.
    /// - Storage failures are errors but not critical.
    /// - No variant is retryable.
    #[test]
    fn test_classification() {
        let not_found = CommonError::not_found_with_id("driver", "postgres");
        assert_eq!(not_found.severity(), ErrorSeverity::Info);
        assert!(!not_found.is_critical());

        let storage = CommonError::storage_op("open", "file is not a database");
        assert_eq!(storage.severity(), ErrorSeverity::Error);
        assert!(!storage.is_critical());

        let persistence = CommonError::persistence_op("read_config", "disk full");
        assert!(!persistence.is_retryable());
        assert_eq!(persistence.retry_after(), None);
    }

    /// Validates that severities order from least to most severe.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    /// Validates TOML parse errors land in the serialization family.
    #[test]
    fn test_from_toml_error() {
        let parse: Result<toml::Value, _> = toml::from_str("path = ");
        let err = CommonError::from(parse.unwrap_err());
        assert!(matches!(err, CommonError::Serialization { format: Some(ref f), .. } if f == "TOML"));
    }
}
