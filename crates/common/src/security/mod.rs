//! Security primitives
//!
//! Zeroizing containers for key material.

pub mod secret;

pub use secret::{SecretBytes, SecureString};
