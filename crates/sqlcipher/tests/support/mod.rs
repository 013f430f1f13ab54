//! Shared helpers for the driver integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use cipherbridge_common::testing::TempDir;
use cipherbridge_sqlcipher::open_dsn;
use rand::Rng;

/// Passphrase used by tests that do not care about the key value.
pub const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Scratch directory holding the databases of one test.
pub struct TestDb {
    dir: TempDir,
}

impl TestDb {
    /// Create a fresh scratch directory.
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("cipherbridge_sqlcipher=debug"))
            .with_test_writer()
            .try_init();

        Self { dir: TempDir::new("cipherbridge-tests").expect("failed to create temp dir") }
    }

    /// Filesystem path of `name` inside the scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.file_path(name)
    }

    /// Connection string for `name` with the given query (may be empty).
    pub fn dsn(&self, name: &str, query: &str) -> String {
        let path = self.path(name);
        if query.is_empty() {
            path.display().to_string()
        } else {
            format!("{}?{query}", path.display())
        }
    }

    /// Create `name` through the bridge, write one row, and close it.
    pub fn create_with_row(&self, name: &str, query: &str, value: &str) -> PathBuf {
        let conn = open_dsn(&self.dsn(name, query)).expect("failed to create database");
        conn.execute_batch("CREATE TABLE notes (body TEXT NOT NULL);")
            .expect("failed to create table");
        conn.execute("INSERT INTO notes (body) VALUES (?1)", [value]).expect("failed to insert row");
        conn.close().expect("failed to close database");
        self.path(name)
    }

    /// Raw bytes of a file in the scratch directory.
    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path(name)).expect("failed to read database file")
    }

    /// The underlying scratch directory.
    pub fn dir(&self) -> &TempDir {
        &self.dir
    }
}

/// `x'<64 hex>'` literal for a random 32-byte key.
pub fn random_raw_key() -> String {
    let mut key = [0u8; 32];
    rand::thread_rng().fill(&mut key);
    format!("x'{}'", hex::encode_upper(key))
}

/// Read the single stored note back through `dsn`.
pub fn read_note(dsn: &str) -> cipherbridge_sqlcipher::DriverResult<String> {
    let conn = open_dsn(dsn)?;
    let body = conn
        .query_row("SELECT body FROM notes", [], |row| row.get(0))
        .expect("failed to read note");
    conn.close()?;
    Ok(body)
}
