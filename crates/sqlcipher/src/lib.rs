//! # cipherbridge SQLCipher driver
//!
//! Opens plaintext and SQLCipher-encrypted SQLite databases through one
//! connection-string driven entry point, and tells the two apart on disk
//! without a key.
//!
//! This crate contains:
//! - Encryption detection from the file header ([`detect`])
//! - Connection string parsing ([`dsn`])
//! - Cipher directive planning and connection tuning ([`cipher`],
//!   [`pragmas`])
//! - The configuration bridge ([`connection`])
//! - Driver registration, r2d2 pooling and TOML configuration ([`driver`],
//!   [`pool`], [`config`])
//!
//! ## Example
//! ```rust,ignore
//! use cipherbridge_sqlcipher::{classify, open_dsn, Classification};
//!
//! let conn = open_dsn("app.db?_pragma_key=correct%20horse&_pragma_cipher_page_size=4096")?;
//! conn.execute_batch("CREATE TABLE IF NOT EXISTS notes (body TEXT)")?;
//! conn.close()?;
//!
//! assert_eq!(classify("app.db")?, Classification::Encrypted);
//! ```

#![forbid(unsafe_code)]

pub mod cipher;
pub mod config;
pub mod connection;
pub mod detect;
pub mod driver;
pub mod dsn;
pub mod error;
pub mod pool;
pub mod pragmas;

// Re-export commonly used items
pub use cipher::{CipherDirective, CipherPlan, KeyMaterial};
pub use config::{DatabaseConfig, KeySource};
pub use connection::{open_configured, open_dsn, CipherConnection};
pub use detect::{classify, classify_with, is_encrypted, Classification, HeaderFormat};
pub use driver::{drivers, register, register_default, Driver, SqlCipherDriver, DRIVER_NAME};
pub use dsn::{ConnectionOptions, Dsn, OptionKind};
pub use error::{DriverError, DriverResult};
pub use pool::{build_pool, CipherConnectionManager, CipherPool, PoolConfig};
pub use pragmas::{ConnectionTuning, JournalMode, Synchronous};
