use thiserror::Error;

/// Result type for BLTE operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("truncated container: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid BLTE magic: {0:#010x}")]
    InvalidMagic(u32),

    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),

    #[error("invalid block table: {0}")]
    InvalidBlockTable(&'static str),

    /// Container or block MD5 did not match.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unsupported block mode: {0:#04x}")]
    UnsupportedBlockMode(u8),

    #[error("unsupported encryption type: {0:#04x}")]
    UnsupportedEncryptionType(u8),

    #[error("invalid encrypted block: {0}")]
    InvalidEncryptedBlock(&'static str),

    /// TACT key not present in the ring. Non-fatal in partial mode.
    #[error("missing TACT key: {0}")]
    MissingKey(String),

    #[error("zlib inflate failed: {0}")]
    Inflate(String),

    #[error(transparent)]
    Crypto(#[from] casc_crypto::CryptoError),
}
