//! Secret containers with automatic memory zeroization
//!
//! Key material handed to the storage engine lives in these wrappers so it is
//! wiped when dropped and never shows up in `Debug` or `Display` output.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secure string that zeroes memory on drop
///
/// `PartialEq` is not constant-time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Expose the inner value (use with caution)
    ///
    /// The exposed value should not be stored or logged.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for SecureString {}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Binary secret (raw cipher keys, salts) that zeroes memory on drop
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes {
    inner: Zeroizing<Vec<u8>>,
}

impl SecretBytes {
    /// Take ownership of `bytes`
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { inner: Zeroizing::new(bytes) }
    }

    /// Expose the raw bytes (use with caution)
    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    /// Number of bytes held
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes({} bytes, ***)", self.inner.len())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for security::secret.
    use super::*;

    /// Validates that the secure string keeps its value reachable through
    /// `expose` only.
    ///
    /// Assertions:
    /// - Confirms `s.len()` equals `10`.
    /// - Confirms `s.expose()` equals `"passphrase"`.
    #[test]
    fn test_secure_string_creation() {
        let s = SecureString::new("passphrase");
        assert_eq!(s.len(), 10);
        assert_eq!(s.expose(), "passphrase");
        assert!(!s.is_empty());
    }

    /// Validates that neither formatter leaks the secret.
    #[test]
    fn test_secure_string_redaction() {
        let s = SecureString::new("secret");
        assert_eq!(format!("{:?}", s), "SecureString(***)");
        assert_eq!(format!("{}", s), "***");
    }

    /// Validates equality on the held value.
    #[test]
    fn test_secure_string_eq() {
        assert_eq!(SecureString::new("pw"), SecureString::new(String::from("pw")));
        assert_ne!(SecureString::new("pw"), SecureString::new("much longer passphrase"));
    }

    /// Validates that binary secrets report their size but not their
    /// contents.
    ///
    /// Assertions:
    /// - Confirms the debug string equals `"SecretBytes(32 bytes, ***)"`.
    #[test]
    fn test_secret_bytes_debug() {
        let bytes = SecretBytes::new(vec![0xAB; 32]);
        assert_eq!(bytes.len(), 32);
        assert_eq!(format!("{:?}", bytes), "SecretBytes(32 bytes, ***)");
        assert!(!format!("{:?}", bytes).contains("ab"));
    }
}
