//! Temporary directory helpers
//!
//! Scratch directories for database files that are removed on drop.

#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};
use std::{fs, io};

/// Temporary directory that is automatically deleted when dropped
///
/// # Examples
///
/// ```rust,ignore
/// use cipherbridge_common::testing::TempDir;
///
/// let dir = TempDir::new("detect").unwrap();
/// let db = dir.file_path("app.db");
/// assert!(!db.exists());
/// ```
#[derive(Debug)]
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Create a new temporary directory with a prefix
    pub fn new(prefix: &str) -> io::Result<Self> {
        let dir_name = format!("{}-{}", prefix, uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(dir_name);

        fs::create_dir_all(&path)?;

        Ok(Self { path })
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory, without creating anything
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Create a file holding exactly `contents`
    pub fn create_file(&self, name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let file_path = self.file_path(name);
        fs::write(&file_path, contents)?;
        Ok(file_path)
    }

    /// Create a zero-length file
    pub fn create_empty_file(&self, name: &str) -> io::Result<PathBuf> {
        self.create_file(name, &[])
    }

    /// Keep the directory (don't delete on drop) and return its path
    pub fn keep(mut self) -> PathBuf {
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if !self.path.as_os_str().is_empty() && self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
