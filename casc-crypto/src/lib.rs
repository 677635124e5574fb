//! Decryption support for encrypted CASC content.
//!
//! This crate provides:
//! - the Salsa20 stream cipher variant used by encrypted BLTE blocks
//! - the TACT key ring: an 8-byte key name → symmetric key map with
//!   JSON and plain-text loaders

pub mod error;
pub mod keyring;
pub mod salsa20;

pub use error::CryptoError;
pub use keyring::TactKeyring;
pub use salsa20::Salsa20;

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
