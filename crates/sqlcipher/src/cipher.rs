//! Cipher directive planning
//!
//! Turns connection options into the ordered sequence of SQLCipher pragmas
//! issued right after the engine handle is opened:
//!
//! ```sql
//! PRAGMA key = '<passphrase or x''<hex>''>';
//! PRAGMA cipher_page_size = 4096;
//! PRAGMA cipher_compatibility = 3;
//! PRAGMA kdf_iter = 64000;
//! PRAGMA cipher_memory_security = ON;
//! ```
//!
//! The key always goes first and the rest keep the order above. Planning is
//! pure, so malformed options fail before anything touches the filesystem.

use std::fmt;

use cipherbridge_common::security::{SecretBytes, SecureString};
use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::dsn::{parse_bool, ConnectionOptions, OptionKind};
use crate::error::{DriverError, DriverResult};

/// Raw key length in bytes
pub const RAW_KEY_LEN: usize = 32;
/// Explicit salt length in bytes
pub const RAW_SALT_LEN: usize = 16;

const MIN_PAGE_SIZE: u32 = 512;
const MAX_PAGE_SIZE: u32 = 65536;

/// Key material handed to the engine
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Passphrase run through the engine's key derivation
    Passphrase(SecureString),
    /// Raw key bytes, optionally followed by an explicit salt
    Raw {
        /// 32-byte cipher key
        key: SecretBytes,
        /// 16-byte database salt
        salt: Option<SecretBytes>,
    },
}

impl KeyMaterial {
    /// Interpret a key option value
    ///
    /// `x'<64 hex>'` is a raw key, `x'<96 hex>'` a raw key plus salt, and
    /// anything else is a passphrase, including `x'...'` values that are not
    /// valid hex of one of those lengths.
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] when the value is empty.
    pub fn parse(value: &SecureString) -> DriverResult<Self> {
        let text = value.expose();
        if text.is_empty() {
            return Err(DriverError::invalid_option(OptionKind::Key.name(), "must not be empty"));
        }

        let raw = raw_literal_body(text).and_then(|digits| hex::decode(digits).ok());
        let Some(bytes) = raw.map(SecretBytes::new) else {
            return Ok(Self::Passphrase(value.clone()));
        };

        match bytes.len() {
            RAW_KEY_LEN => Ok(Self::Raw { key: bytes, salt: None }),
            len if len == RAW_KEY_LEN + RAW_SALT_LEN => {
                let (key, salt) = bytes.expose().split_at(RAW_KEY_LEN);
                Ok(Self::Raw {
                    key: SecretBytes::new(key.to_vec()),
                    salt: Some(SecretBytes::new(salt.to_vec())),
                })
            }
            len => {
                debug!(len, "Hex literal is not a raw key length; using it as a passphrase");
                Ok(Self::Passphrase(value.clone()))
            }
        }
    }

    /// Whether this is a raw key literal
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    /// Value passed to `PRAGMA key`
    fn pragma_value(&self) -> SecureString {
        match self {
            Self::Passphrase(passphrase) => passphrase.clone(),
            Self::Raw { key, salt } => {
                let mut literal = String::with_capacity(3 + 2 * (RAW_KEY_LEN + RAW_SALT_LEN));
                literal.push_str("x'");
                literal.push_str(&hex::encode_upper(key.expose()));
                if let Some(salt) = salt {
                    literal.push_str(&hex::encode_upper(salt.expose()));
                }
                literal.push('\'');
                SecureString::new(literal)
            }
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passphrase(_) => f.write_str("Passphrase(***)"),
            Self::Raw { salt, .. } => {
                write!(f, "Raw {{ key: ***, salt: {} }}", if salt.is_some() { "***" } else { "None" })
            }
        }
    }
}

fn raw_literal_body(text: &str) -> Option<&str> {
    let body = text.strip_prefix("x'").or_else(|| text.strip_prefix("X'"))?;
    body.strip_suffix('\'')
}

/// One engine directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherDirective {
    /// `PRAGMA key`
    Key(KeyMaterial),
    /// `PRAGMA cipher_page_size`
    PageSize(u32),
    /// `PRAGMA cipher_compatibility`
    Compatibility(u8),
    /// `PRAGMA kdf_iter`
    KdfIter(u32),
    /// `PRAGMA cipher_memory_security`
    MemorySecurity(bool),
}

impl CipherDirective {
    /// Pragma this directive issues
    pub fn pragma_name(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::PageSize(_) => "cipher_page_size",
            Self::Compatibility(_) => "cipher_compatibility",
            Self::KdfIter(_) => "kdf_iter",
            Self::MemorySecurity(_) => "cipher_memory_security",
        }
    }

    /// Issue the directive on `conn`
    ///
    /// # Errors
    /// Returns [`DriverError::Connection`] when the engine rejects it.
    pub fn apply(&self, conn: &Connection) -> DriverResult<()> {
        let result = match self {
            Self::Key(material) => conn.pragma_update(None, "key", material.pragma_value().expose()),
            Self::PageSize(size) => conn.pragma_update(None, "cipher_page_size", size),
            Self::Compatibility(version) => {
                conn.pragma_update(None, "cipher_compatibility", version)
            }
            Self::KdfIter(iterations) => conn.pragma_update(None, "kdf_iter", iterations),
            Self::MemorySecurity(enabled) => {
                conn.pragma_update(None, "cipher_memory_security", if *enabled { "ON" } else { "OFF" })
            }
        };

        result.map_err(|e| {
            error!(pragma = self.pragma_name(), error = %e, "Cipher directive rejected");
            DriverError::engine(&format!("failed to set {}", self.pragma_name()), &e)
        })
    }
}

/// Ordered cipher directives for one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherPlan {
    directives: Vec<CipherDirective>,
}

impl CipherPlan {
    /// Build the plan from parsed options
    ///
    /// Without a key the database is opened as plaintext and the other
    /// cipher options are ignored.
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] for an empty key, a cipher
    /// option value out of range, or a page size that differs from the one
    /// the requested compatibility revision selects.
    pub fn from_options(options: &ConnectionOptions) -> DriverResult<Self> {
        let Some(key) = options.key() else {
            let ignored: Vec<&str> = options
                .recognized()
                .filter(|(kind, _)| kind.is_cipher())
                .map(|(kind, _)| kind.name())
                .collect();
            if !ignored.is_empty() {
                warn!(options = ?ignored, "Cipher options given without a key; opening as plaintext");
            }
            return Ok(Self::default());
        };

        let mut directives = vec![CipherDirective::Key(KeyMaterial::parse(key)?)];

        let page_size = options.get(OptionKind::CipherPageSize).map(parse_page_size).transpose()?;
        let compatibility =
            options.get(OptionKind::CipherCompatibility).map(parse_compatibility).transpose()?;

        // cipher_compatibility resets the page size to its profile default.
        if let (Some(size), Some(version)) = (page_size, compatibility) {
            let profile_size = compatibility_page_size(version);
            if size != profile_size {
                return Err(DriverError::invalid_option(
                    OptionKind::CipherPageSize.name(),
                    format!(
                        "{size} contradicts cipher_compatibility {version}, which uses {profile_size}"
                    ),
                ));
            }
        }

        if let Some(size) = page_size {
            directives.push(CipherDirective::PageSize(size));
        }
        if let Some(version) = compatibility {
            directives.push(CipherDirective::Compatibility(version));
        }
        if let Some(value) = options.get(OptionKind::KdfIter) {
            directives.push(CipherDirective::KdfIter(parse_kdf_iter(value)?));
        }
        if let Some(value) = options.get(OptionKind::CipherMemorySecurity) {
            let enabled = parse_bool(OptionKind::CipherMemorySecurity.name(), value)?;
            directives.push(CipherDirective::MemorySecurity(enabled));
        }

        Ok(Self { directives })
    }

    /// Whether the plan leaves the database unencrypted
    pub fn is_plaintext(&self) -> bool {
        self.directives.is_empty()
    }

    /// Directives in issue order
    pub fn directives(&self) -> &[CipherDirective] {
        &self.directives
    }

    /// Issue every directive on a freshly opened handle
    ///
    /// # Errors
    /// Returns [`DriverError::Connection`] on the first rejected directive.
    pub fn apply(&self, conn: &Connection) -> DriverResult<()> {
        let start = std::time::Instant::now();

        for directive in &self.directives {
            directive.apply(conn)?;
        }

        debug!(
            directives = self.directives.len(),
            duration_ms = start.elapsed().as_millis(),
            "Cipher directives applied"
        );
        Ok(())
    }
}

fn parse_page_size(value: &str) -> DriverResult<u32> {
    let option = OptionKind::CipherPageSize.name();
    let size: u32 = value
        .parse()
        .map_err(|_| DriverError::invalid_option(option, format!("'{value}' is not a number")))?;

    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) || !size.is_power_of_two() {
        return Err(DriverError::invalid_option(
            option,
            format!("{size} is not a power of two between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}"),
        ));
    }
    Ok(size)
}

fn parse_compatibility(value: &str) -> DriverResult<u8> {
    let option = OptionKind::CipherCompatibility.name();
    match value.parse::<u8>() {
        Ok(version @ 1..=4) => Ok(version),
        _ => Err(DriverError::invalid_option(option, format!("'{value}' is not a revision 1-4"))),
    }
}

/// Page size a compatibility revision selects
pub fn compatibility_page_size(version: u8) -> u32 {
    if version >= 4 {
        4096
    } else {
        1024
    }
}

fn parse_kdf_iter(value: &str) -> DriverResult<u32> {
    let option = OptionKind::KdfIter.name();
    match value.parse::<u32>() {
        Ok(0) => Err(DriverError::invalid_option(option, "must be positive")),
        Ok(iterations) => Ok(iterations),
        Err(_) => Err(DriverError::invalid_option(option, format!("'{value}' is not a number"))),
    }
}
