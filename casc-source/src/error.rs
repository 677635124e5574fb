use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] casc_formats::Error),

    #[error(transparent)]
    Blte(#[from] casc_blte::Error),

    #[error(transparent)]
    Crypto(#[from] casc_crypto::CryptoError),

    #[error(transparent)]
    Cache(#[from] casc_cache::Error),

    #[error(transparent)]
    Transport(#[from] casc_cdn::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The install directory has no readable `.build.info`.
    #[error("not a valid installation: {0:?}")]
    InvalidInstall(PathBuf),

    #[error("build index {0} out of range")]
    InvalidBuildIndex(usize),

    /// An operation that needs a loaded build was called before one.
    #[error("no build loaded")]
    NotLoaded,

    #[error("FileDataID {0} not present in root")]
    FileIdNotFound(u32),

    /// No visible root type for the FileDataID maps into the encoding table.
    #[error("no encoding key for FileDataID {0}")]
    EncodingKeyNotFound(u32),

    #[error("content key {0} not present in encoding")]
    ContentKeyNotFound(String),

    /// Local journal, archive, and direct fetch all missed.
    #[error("no data for encoding key {0}")]
    DataNotFound(String),

    #[error("missing config field: {0}")]
    MissingConfigKey(&'static str),

    #[error("no CDN config key known for product {0}")]
    MissingCdnConfig(String),

    #[error("region {0} not present in cdns response")]
    RegionNotInCdns(String),

    #[error("product {0} not served by the remote region")]
    NoRemoteProduct(String),

    /// A source is already active; unload it before staging another.
    #[error("a storage source is already active")]
    ActiveAlreadyLoaded,

    #[error("no pending storage source to promote")]
    NoPendingSource,

    /// Surfaced for the listfile collaborator's response mapping.
    #[error("listfile not loaded")]
    ListfileNotLoaded,
}

impl Error {
    /// Response code surfaced to REST-level collaborators.
    pub fn response_code(&self) -> &'static str {
        match self {
            Error::NotLoaded => "ERR_NO_CASC",
            Error::ActiveAlreadyLoaded => "ERR_CASC_ACTIVE",
            Error::NoPendingSource => "ERR_NO_CASC_SETUP",
            Error::InvalidInstall(_) => "ERR_INVALID_INSTALL",
            Error::ListfileNotLoaded => "ERR_LISTFILE_NOT_LOADED",
            Error::FileIdNotFound(_)
            | Error::EncodingKeyNotFound(_)
            | Error::DataNotFound(_) => "ERR_NO_CASC",
            _ => "ERR_INVALID_CASC_BUILD",
        }
    }
}
