use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Salsa20 accepts 16- or 32-byte keys only.
    #[error("invalid key length: {0} (expected 16 or 32)")]
    InvalidKeyLength(usize),

    /// A key name must be 8 bytes (16 hex characters).
    #[error("invalid key name: {0:?}")]
    InvalidKeyName(String),

    /// Key material that is not 16 or 32 bytes of hex.
    #[error("invalid key material: {0:?}")]
    InvalidKeyHex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
