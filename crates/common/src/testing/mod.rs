//! Testing utilities and helpers
//!
//! - **[`temp`]**: scratch directories for database files

pub mod temp;

pub use temp::TempDir;
