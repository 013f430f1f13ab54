//! Encryption detection
//!
//! Classifies a database file by its first bytes alone. A plaintext SQLite
//! database always starts with the engine's 16-byte magic string; SQLCipher
//! encrypts every page including page 1, so the magic disappears. No key
//! material is needed to tell the two apart.
//!
//! Files produced by older SQLCipher revisions classify as encrypted too,
//! even when the current defaults cannot open them.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{DriverError, DriverResult};

/// Length of the plaintext header prefix that gets compared
pub const HEADER_PREFIX_LEN: usize = 16;

/// On-disk plaintext header of a storage engine format revision
///
/// The magic bytes belong to the engine, not to this crate. When the bundled
/// engine moves to a new file format revision, add a new constant here and
/// point [`HeaderFormat::CURRENT`] at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFormat {
    /// Engine file format revision the magic belongs to
    pub revision: u32,
    /// Bytes found at offset 0 of every plaintext file
    pub magic: [u8; HEADER_PREFIX_LEN],
}

impl HeaderFormat {
    /// SQLite 3 file format: `"SQLite format 3\0"`
    pub const SQLITE3: Self = Self { revision: 3, magic: *b"SQLite format 3\0" };

    /// Header format written by the bundled engine
    pub const CURRENT: Self = Self::SQLITE3;
}

impl Default for HeaderFormat {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// What a file on disk looks like to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Nothing exists at the path
    NoFile,
    /// The file exists but holds zero bytes (a database not yet written)
    EmptyFile,
    /// The file starts with the plaintext magic
    Plaintext,
    /// Anything else, including files shorter than the magic
    Encrypted,
}

impl Classification {
    /// Stable lowercase label for logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFile => "no-file",
            Self::EmptyFile => "empty",
            Self::Plaintext => "plaintext",
            Self::Encrypted => "encrypted",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the file at `path` against the current engine header
///
/// # Errors
/// Returns [`DriverError::Io`] when the path exists but cannot be opened or
/// read. A missing path is [`Classification::NoFile`], not an error.
pub fn classify(path: impl AsRef<Path>) -> DriverResult<Classification> {
    classify_with(path, &HeaderFormat::CURRENT)
}

/// Classify the file at `path` against an explicit header format
///
/// # Errors
/// Same as [`classify`].
#[instrument(skip_all, fields(path = %path.as_ref().display(), revision = format.revision))]
pub fn classify_with(
    path: impl AsRef<Path>,
    format: &HeaderFormat,
) -> DriverResult<Classification> {
    let path = path.as_ref();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(classification = %Classification::NoFile, "Classified database file");
            return Ok(Classification::NoFile);
        }
        Err(err) => return Err(DriverError::io(path, err)),
    };

    let metadata = file.metadata().map_err(|e| DriverError::io(path, e))?;
    if metadata.is_dir() {
        return Err(DriverError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path is a directory"),
        ));
    }

    let size = metadata.len();
    let classification = if size == 0 {
        Classification::EmptyFile
    } else {
        let prefix = read_prefix(file).map_err(|e| DriverError::io(path, e))?;
        classify_prefix(&prefix, format)
    };

    debug!(classification = %classification, size, "Classified database file");
    Ok(classification)
}

/// Report whether the file at `path` holds encrypted pages
///
/// Missing and empty files are not encrypted.
///
/// # Errors
/// Same as [`classify`].
pub fn is_encrypted(path: impl AsRef<Path>) -> DriverResult<bool> {
    classify(path).map(|c| c == Classification::Encrypted)
}

/// Classify a header prefix already read from a non-empty file
pub fn classify_prefix(prefix: &[u8], format: &HeaderFormat) -> Classification {
    if prefix == format.magic.as_slice() {
        Classification::Plaintext
    } else {
        Classification::Encrypted
    }
}

// The file is dropped (closed) when this returns, on success and on error.
fn read_prefix(file: File) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(HEADER_PREFIX_LEN);
    file.take(HEADER_PREFIX_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}
