//! Connection string parsing
//!
//! A connection string is `<path>[?option=value[&option=value...]]`. Query
//! options fall in two buckets: options this crate understands
//! ([`OptionKind`]) and everything else, which is forwarded unmodified to the
//! engine as SQLite URI parameters (`mode=ro`, `cache=shared`, `vfs=...`).
//! Unknown options are never an error.
//!
//! Names are case-sensitive. When an option (or one of its aliases) appears
//! more than once, the first occurrence wins.

use std::borrow::Cow;
use std::fmt;

use cipherbridge_common::security::SecureString;
use tracing::debug;

use crate::error::{DriverError, DriverResult};

/// Key material: passphrase or `x'<hex>'` raw key
pub const KEY_OPTION: &str = "_pragma_key";
/// Cipher page size in bytes
pub const CIPHER_PAGE_SIZE_OPTION: &str = "_pragma_cipher_page_size";
/// Cipher scheme revision selector (SQLCipher major version)
pub const CIPHER_COMPATIBILITY_OPTION: &str = "_pragma_cipher_compatibility";
/// KDF iteration override
pub const KDF_ITER_OPTION: &str = "_pragma_kdf_iter";
/// Cipher memory wiping
pub const CIPHER_MEMORY_SECURITY_OPTION: &str = "_pragma_cipher_memory_security";

/// Connection option understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionKind {
    /// `_pragma_key`
    Key,
    /// `_pragma_cipher_page_size`
    CipherPageSize,
    /// `_pragma_cipher_compatibility`
    CipherCompatibility,
    /// `_pragma_kdf_iter`
    KdfIter,
    /// `_pragma_cipher_memory_security`
    CipherMemorySecurity,
    /// `_busy_timeout`, alias `_timeout`
    BusyTimeout,
    /// `_foreign_keys`, alias `_fk`
    ForeignKeys,
    /// `_journal_mode`, alias `_journal`
    JournalMode,
    /// `_synchronous`, alias `_sync`
    Synchronous,
}

impl OptionKind {
    /// Every recognized option
    pub const ALL: [Self; 9] = [
        Self::Key,
        Self::CipherPageSize,
        Self::CipherCompatibility,
        Self::KdfIter,
        Self::CipherMemorySecurity,
        Self::BusyTimeout,
        Self::ForeignKeys,
        Self::JournalMode,
        Self::Synchronous,
    ];

    /// Resolve an option name (or alias) to its kind
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            KEY_OPTION => Some(Self::Key),
            CIPHER_PAGE_SIZE_OPTION => Some(Self::CipherPageSize),
            CIPHER_COMPATIBILITY_OPTION => Some(Self::CipherCompatibility),
            KDF_ITER_OPTION => Some(Self::KdfIter),
            CIPHER_MEMORY_SECURITY_OPTION => Some(Self::CipherMemorySecurity),
            "_busy_timeout" | "_timeout" => Some(Self::BusyTimeout),
            "_foreign_keys" | "_fk" => Some(Self::ForeignKeys),
            "_journal_mode" | "_journal" => Some(Self::JournalMode),
            "_synchronous" | "_sync" => Some(Self::Synchronous),
            _ => None,
        }
    }

    /// Canonical option name
    pub fn name(self) -> &'static str {
        match self {
            Self::Key => KEY_OPTION,
            Self::CipherPageSize => CIPHER_PAGE_SIZE_OPTION,
            Self::CipherCompatibility => CIPHER_COMPATIBILITY_OPTION,
            Self::KdfIter => KDF_ITER_OPTION,
            Self::CipherMemorySecurity => CIPHER_MEMORY_SECURITY_OPTION,
            Self::BusyTimeout => "_busy_timeout",
            Self::ForeignKeys => "_foreign_keys",
            Self::JournalMode => "_journal_mode",
            Self::Synchronous => "_synchronous",
        }
    }

    /// Whether the option configures the cipher (and needs a key to matter)
    pub fn is_cipher(self) -> bool {
        matches!(
            self,
            Self::Key
                | Self::CipherPageSize
                | Self::CipherCompatibility
                | Self::KdfIter
                | Self::CipherMemorySecurity
        )
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options decoded from a connection string query
///
/// The key option is held in a [`SecureString`]; everything else is plain
/// text. Insertion order is preserved in both buckets.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    key: Option<SecureString>,
    recognized: Vec<(OptionKind, String)>,
    passthrough: Vec<(String, String)>,
}

impl ConnectionOptions {
    /// Empty option set (plaintext connection, engine defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a query component (`a=1&b=2`, percent-encoded, `+` as space)
    pub fn parse_query(query: &str) -> Self {
        let mut options = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if !options.insert(&name, value) {
                debug!(option = %name, "Ignoring duplicate connection option");
            }
        }
        options
    }

    /// Record an option; returns `false` when an earlier occurrence already
    /// set it
    pub fn insert<'a>(&mut self, name: &str, value: impl Into<Cow<'a, str>>) -> bool {
        let value = value.into();
        match OptionKind::from_name(name) {
            Some(OptionKind::Key) => {
                if self.key.is_some() {
                    return false;
                }
                self.key = Some(SecureString::new(value.into_owned()));
            }
            Some(kind) => {
                if self.get(kind).is_some() {
                    return false;
                }
                self.recognized.push((kind, value.into_owned()));
            }
            None => {
                if self.passthrough.iter().any(|(n, _)| n == name) {
                    return false;
                }
                self.passthrough.push((name.to_string(), value.into_owned()));
            }
        }
        true
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Key material, if the key option was supplied
    pub fn key(&self) -> Option<&SecureString> {
        self.key.as_ref()
    }

    /// Value of a recognized non-key option
    pub fn get(&self, kind: OptionKind) -> Option<&str> {
        self.recognized.iter().find(|(k, _)| *k == kind).map(|(_, v)| v.as_str())
    }

    /// Recognized non-key options in insertion order
    pub fn recognized(&self) -> impl Iterator<Item = (OptionKind, &str)> {
        self.recognized.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Options forwarded verbatim to the engine
    pub fn passthrough(&self) -> &[(String, String)] {
        &self.passthrough
    }

    /// Whether no option at all was supplied
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.recognized.is_empty() && self.passthrough.is_empty()
    }

    /// Render back into a percent-encoded query component
    ///
    /// The result contains the key, so it is returned as a [`SecureString`].
    pub fn to_query(&self) -> SecureString {
        let mut pairs: Vec<String> = Vec::new();
        if let Some(key) = &self.key {
            pairs.push(format!("{}={}", KEY_OPTION, urlencoding::encode(key.expose())));
        }
        for (kind, value) in &self.recognized {
            pairs.push(format!("{}={}", kind.name(), urlencoding::encode(value)));
        }
        for (name, value) in &self.passthrough {
            pairs.push(format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)));
        }
        SecureString::new(pairs.join("&"))
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("key", &self.key.as_ref().map(|_| "***"))
            .field("recognized", &self.recognized)
            .field("passthrough", &self.passthrough)
            .finish()
    }
}

/// A parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    path: String,
    options: ConnectionOptions,
}

impl Dsn {
    /// Parse `<path>[?query]`
    ///
    /// A plain path is taken literally. A `file:` path is in URI form, so its
    /// percent-escapes are decoded (`file:a%20b.db` names `a b.db`).
    ///
    /// # Errors
    /// Returns [`DriverError::Configuration`] when the path part is empty or
    /// a `file:` path does not decode to UTF-8.
    pub fn parse(dsn: &str) -> DriverResult<Self> {
        let (path, query) = match dsn.split_once('?') {
            Some((path, query)) => (path, query),
            None => (dsn, ""),
        };
        let path = match path.strip_prefix("file:") {
            Some(uri_path) => urlencoding::decode(uri_path)
                .map_err(|e| {
                    DriverError::Configuration(format!("invalid escape in database path: {e}"))
                })?
                .into_owned(),
            None => path.to_string(),
        };

        if path.is_empty() {
            return Err(DriverError::Configuration(
                "connection string has an empty database path".to_string(),
            ));
        }

        Ok(Self { path, options: ConnectionOptions::parse_query(query) })
    }

    /// Build from parts
    pub fn new(path: impl Into<String>, options: ConnectionOptions) -> Self {
        Self { path: path.into(), options }
    }

    /// Database path (or `:memory:`)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded options
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Split into path and options
    pub fn into_parts(self) -> (String, ConnectionOptions) {
        (self.path, self.options)
    }

    /// Render back into a connection string (contains the key)
    pub fn to_connection_string(&self) -> SecureString {
        let path = if self.path.contains('?') {
            format!("file:{}", escape_uri_path(&self.path))
        } else {
            self.path.clone()
        };
        if self.options.is_empty() {
            return SecureString::new(path);
        }
        SecureString::new(format!("{}?{}", path, self.options.to_query().expose()))
    }
}

impl std::str::FromStr for Dsn {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Escape a filesystem path for the path part of a `file:` URI
pub(crate) fn escape_uri_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3f"),
            '#' => escaped.push_str("%23"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Parse a boolean option value the way SQLite connection strings spell them
pub(crate) fn parse_bool(option: &str, value: &str) -> DriverResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DriverError::invalid_option(option, format!("'{value}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for dsn.
    use super::*;

    /// Validates splitting of path and query, including percent-decoding.
    ///
    /// Assertions:
    /// - Confirms the path is `"t.db"`.
    /// - Confirms the decoded key is `"pass word&more"`.
    /// - Confirms the page size option is `"4096"`.
    #[test]
    fn test_parse_path_and_options() {
        let dsn =
            Dsn::parse("t.db?_pragma_key=pass%20word%26more&_pragma_cipher_page_size=4096").unwrap();

        assert_eq!(dsn.path(), "t.db");
        assert_eq!(dsn.options().key().unwrap().expose(), "pass word&more");
        assert_eq!(dsn.options().get(OptionKind::CipherPageSize), Some("4096"));
        assert!(dsn.options().passthrough().is_empty());
    }

    /// Validates that a bare path carries no options.
    #[test]
    fn test_parse_bare_path() {
        let dsn = Dsn::parse("/var/lib/app.db").unwrap();
        assert_eq!(dsn.path(), "/var/lib/app.db");
        assert!(dsn.options().is_empty());
    }

    /// Validates `file:` prefix stripping.
    #[test]
    fn test_parse_file_prefix() {
        let dsn = Dsn::parse("file:data.db?mode=ro").unwrap();
        assert_eq!(dsn.path(), "data.db");
        assert_eq!(dsn.options().passthrough(), &[("mode".to_string(), "ro".to_string())]);
    }

    /// Validates that `file:` paths are percent-decoded and plain paths are
    /// taken literally.
    ///
    /// Assertions:
    /// - `file:a%20b.db` names `a b.db`.
    /// - `a%20b.db` without the prefix names `a%20b.db`.
    /// - A decoded `?` survives rendering and reparsing.
    #[test]
    fn test_file_path_percent_decoding() {
        assert_eq!(Dsn::parse("file:a%20b.db?mode=ro").unwrap().path(), "a b.db");
        assert_eq!(Dsn::parse("a%20b.db?mode=ro").unwrap().path(), "a%20b.db");
        assert!(matches!(Dsn::parse("file:%FF.db"), Err(DriverError::Configuration(_))));

        let odd = Dsn::parse("file:what%3F.db?_pragma_key=pw").unwrap();
        assert_eq!(odd.path(), "what?.db");
        let reparsed = Dsn::parse(odd.to_connection_string().expose()).unwrap();
        assert_eq!(reparsed, odd);
    }

    /// Validates that an empty path is a configuration error.
    #[test]
    fn test_parse_empty_path() {
        assert!(matches!(Dsn::parse("?_pragma_key=pw"), Err(DriverError::Configuration(_))));
        assert!(matches!(Dsn::parse(""), Err(DriverError::Configuration(_))));
    }

    /// Validates that unknown options land in the pass-through bucket in
    /// order.
    #[test]
    fn test_unknown_options_pass_through() {
        let options = ConnectionOptions::parse_query("foo=bar&cache=shared&_pragma_key=pw");

        assert_eq!(
            options.passthrough(),
            &[("foo".to_string(), "bar".to_string()), ("cache".to_string(), "shared".to_string())]
        );
        assert!(options.key().is_some());
    }

    /// Validates first-occurrence-wins for duplicates and aliases.
    ///
    /// Assertions:
    /// - Confirms the first key `"first"` is kept.
    /// - Confirms `_timeout` after `_busy_timeout` is ignored.
    /// - Confirms a duplicate pass-through keeps the first value.
    #[test]
    fn test_first_occurrence_wins() {
        let options = ConnectionOptions::parse_query(
            "_pragma_key=first&_pragma_key=second&_busy_timeout=100&_timeout=900&x=1&x=2",
        );

        assert_eq!(options.key().unwrap().expose(), "first");
        assert_eq!(options.get(OptionKind::BusyTimeout), Some("100"));
        assert_eq!(options.passthrough(), &[("x".to_string(), "1".to_string())]);
    }

    /// Validates that option names are case-sensitive.
    #[test]
    fn test_names_are_case_sensitive() {
        let options = ConnectionOptions::parse_query("_PRAGMA_KEY=pw");
        assert!(options.key().is_none());
        assert_eq!(options.passthrough().len(), 1);
    }

    /// Validates that an empty key value is still recorded (rejected later
    /// when the cipher plan is built).
    #[test]
    fn test_empty_key_is_recorded() {
        let options = ConnectionOptions::parse_query("_pragma_key=");
        assert!(options.key().unwrap().is_empty());
    }

    /// Validates that Debug output redacts the key.
    #[test]
    fn test_debug_redacts_key() {
        let options = ConnectionOptions::new().with(KEY_OPTION, "hunter2");
        let debug = format!("{:?}", options);

        assert!(debug.contains("***"));
        assert!(!debug.contains("hunter2"));
    }

    /// Validates that rendering and re-parsing preserves every option.
    #[test]
    fn test_render_connection_string() {
        let options = ConnectionOptions::new()
            .with(KEY_OPTION, "p&w d")
            .with(KDF_ITER_OPTION, "64000")
            .with("foo", "bar");
        let dsn = Dsn::new("t.db", options.clone());

        let rendered = dsn.to_connection_string();
        let reparsed = Dsn::parse(rendered.expose()).unwrap();

        assert_eq!(reparsed.path(), "t.db");
        assert_eq!(reparsed.options(), &options);
    }

    /// Validates alias resolution and cipher grouping.
    #[test]
    fn test_option_kinds() {
        assert_eq!(OptionKind::from_name("_fk"), Some(OptionKind::ForeignKeys));
        assert_eq!(OptionKind::from_name("_sync"), Some(OptionKind::Synchronous));
        assert_eq!(OptionKind::from_name("foo"), None);
        assert!(OptionKind::KdfIter.is_cipher());
        assert!(!OptionKind::JournalMode.is_cipher());

        for kind in OptionKind::ALL {
            assert_eq!(OptionKind::from_name(kind.name()), Some(kind));
        }
    }

    /// Validates the boolean spellings.
    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("_fk", "TRUE").unwrap());
        assert!(parse_bool("_fk", "on").unwrap());
        assert!(!parse_bool("_fk", "0").unwrap());
        assert!(parse_bool("_fk", "maybe").is_err());
    }
}
