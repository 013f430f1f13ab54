//! Declarative database configuration
//!
//! A TOML alternative to hand-written connection strings. The configuration
//! renders into the same [`ConnectionOptions`] the connection string parser
//! produces, so both routes share one bridge.
//!
//! ```toml
//! path = "data/app.db"
//!
//! [key]
//! source = "environment"
//! var_name = "APP_DB_KEY"
//!
//! [cipher]
//! page_size = 4096
//! compatibility = 4
//!
//! [connection]
//! busy_timeout_ms = 5000
//! journal_mode = "WAL"
//!
//! [extra]
//! cache = "shared"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use cipherbridge_common::error::CommonError;
use cipherbridge_common::security::SecureString;
use serde::Deserialize;
use tracing::debug;

use crate::connection::{open_configured, CipherConnection};
use crate::dsn::{
    ConnectionOptions, Dsn, OptionKind, CIPHER_COMPATIBILITY_OPTION,
    CIPHER_MEMORY_SECURITY_OPTION, CIPHER_PAGE_SIZE_OPTION, KDF_ITER_OPTION, KEY_OPTION,
};
use crate::error::{DriverError, DriverResult};
use crate::pool::{build_pool, CipherPool, PoolConfig};

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file path (or `:memory:`)
    pub path: String,

    /// Where the key comes from; absent means plaintext
    #[serde(default)]
    pub key: Option<KeySource>,

    /// Cipher settings, ignored without a key
    #[serde(default)]
    pub cipher: CipherSettings,

    /// Connection tuning
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Extra engine URI parameters (`mode`, `cache`, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,

    /// Pool sizing
    #[serde(default)]
    pub pool: PoolSettings,
}

/// Source for encryption keys
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Key (passphrase or `x'<hex>'`) written into the configuration
    ///
    /// **Security Warning**: only for tests and throwaway databases.
    Direct {
        /// Key value
        key: String,
    },

    /// Read from an environment variable at open time
    Environment {
        /// Variable name
        var_name: String,
    },
}

impl KeySource {
    /// Create a direct key source
    pub fn direct(key: impl Into<String>) -> Self {
        Self::Direct { key: key.into() }
    }

    /// Create an environment variable key source
    pub fn environment(var_name: impl Into<String>) -> Self {
        Self::Environment { var_name: var_name.into() }
    }

    /// Resolve the key material
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] when the environment variable
    /// is unset or not valid UTF-8.
    pub fn resolve(&self) -> DriverResult<SecureString> {
        match self {
            Self::Direct { key } => Ok(SecureString::new(key.clone())),
            Self::Environment { var_name } => std::env::var(var_name)
                .map(SecureString::new)
                .map_err(|e| {
                    DriverError::invalid_option(KEY_OPTION, format!("environment variable {var_name}: {e}"))
                }),
        }
    }
}

// Custom Debug impl to avoid exposing the key
impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct { .. } => f.debug_struct("Direct").field("key", &"***").finish(),
            Self::Environment { var_name } => {
                f.debug_struct("Environment").field("var_name", var_name).finish()
            }
        }
    }
}

/// Cipher settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CipherSettings {
    /// Cipher page size in bytes
    pub page_size: Option<u32>,
    /// Cipher scheme revision (1-4)
    pub compatibility: Option<u8>,
    /// KDF iteration count
    pub kdf_iter: Option<u32>,
    /// Wipe cipher memory on free
    pub memory_security: Option<bool>,
}

/// Connection tuning settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Busy timeout in milliseconds (default: 5000)
    pub busy_timeout_ms: Option<u64>,
    /// Foreign key enforcement
    pub foreign_keys: Option<bool>,
    /// Journal mode (`DELETE`, `WAL`, ...)
    pub journal_mode: Option<String>,
    /// Synchronous level (`OFF`, `NORMAL`, `FULL`, `EXTRA`)
    pub synchronous: Option<String>,
}

/// Pool settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections (default: 10)
    pub max_size: u32,
    /// Checkout timeout in seconds (default: 5)
    pub connection_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_size: 10, connection_timeout_secs: 5 }
    }
}

impl DatabaseConfig {
    /// Create a plaintext configuration for `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set the key source
    pub fn with_key_source(mut self, source: KeySource) -> Self {
        self.key = Some(source);
        self
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`DriverError::Common`] for malformed TOML and
    /// [`DriverError::Configuration`] when validation fails.
    pub fn from_toml_str(text: &str) -> DriverResult<Self> {
        let config: Self = toml::from_str(text).map_err(CommonError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Same as [`from_toml_str`](Self::from_toml_str), plus
    /// [`DriverError::Common`] when the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> DriverResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CommonError::persistence_op("read_config", format!("{}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded database configuration");
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] for an empty path or an empty
    /// pool.
    pub fn validate(&self) -> DriverResult<()> {
        if self.path.is_empty() {
            return Err(DriverError::Configuration("database path cannot be empty".to_string()));
        }
        if self.pool.max_size == 0 {
            return Err(DriverError::Configuration(
                "pool.max_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Render into connection options, resolving the key
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] when the key cannot be
    /// resolved.
    pub fn to_options(&self) -> DriverResult<ConnectionOptions> {
        let mut options = ConnectionOptions::new();

        if let Some(source) = &self.key {
            options.insert(KEY_OPTION, source.resolve()?.expose());
        }

        let cipher = &self.cipher;
        insert_opt(&mut options, CIPHER_PAGE_SIZE_OPTION, cipher.page_size);
        insert_opt(&mut options, CIPHER_COMPATIBILITY_OPTION, cipher.compatibility);
        insert_opt(&mut options, KDF_ITER_OPTION, cipher.kdf_iter);
        insert_opt(&mut options, CIPHER_MEMORY_SECURITY_OPTION, cipher.memory_security);

        let conn = &self.connection;
        insert_opt(&mut options, OptionKind::BusyTimeout.name(), conn.busy_timeout_ms);
        insert_opt(&mut options, OptionKind::ForeignKeys.name(), conn.foreign_keys);
        insert_opt(&mut options, OptionKind::JournalMode.name(), conn.journal_mode.as_ref());
        insert_opt(&mut options, OptionKind::Synchronous.name(), conn.synchronous.as_ref());

        for (name, value) in &self.extra {
            if OptionKind::from_name(name).is_some() {
                return Err(DriverError::invalid_option(
                    name,
                    "belongs in the [key], [cipher] or [connection] table, not [extra]",
                ));
            }
            options.insert(name, value.as_str());
        }

        Ok(options)
    }

    /// Render into a percent-encoded connection string (contains the key)
    ///
    /// # Errors
    /// Same as [`to_options`](Self::to_options).
    pub fn to_dsn(&self) -> DriverResult<SecureString> {
        Ok(Dsn::new(self.path.clone(), self.to_options()?).to_connection_string())
    }

    /// Pool configuration
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.pool.max_size,
            connection_timeout: Duration::from_secs(self.pool.connection_timeout_secs),
            ..PoolConfig::default()
        }
    }

    /// Open one connection
    ///
    /// # Errors
    /// See [`open_configured`].
    pub fn open(&self) -> DriverResult<CipherConnection> {
        self.validate()?;
        open_configured(&self.path, &self.to_options()?)
    }

    /// Build a connection pool
    ///
    /// # Errors
    /// See [`build_pool`].
    pub fn build_pool(&self) -> DriverResult<CipherPool> {
        self.validate()?;
        build_pool(self.to_dsn()?.expose(), &self.pool_config())
    }
}

fn insert_opt<T: ToString>(options: &mut ConnectionOptions, name: &str, value: Option<T>) {
    if let Some(value) = value {
        options.insert(name, value.to_string());
    }
}
