use thiserror::Error;

/// Result type for format parsing.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A parser invariant was violated: bad magic, misaligned offset, or a
    /// read past the end of the buffer. Carries the offending field name.
    #[error("malformed container: {field}")]
    Malformed { field: &'static str },

    /// A format revision this parser does not understand.
    #[error("unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    /// Invalid config text.
    #[error("config syntax error: {0}")]
    ConfigSyntax(&'static str),

    /// A key string that is not valid lowercase hex of the right width.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

impl Error {
    pub(crate) fn malformed(field: &'static str) -> Self {
        Error::Malformed { field }
    }
}
