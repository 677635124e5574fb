use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response outside the accepted status range.
    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },

    /// Host ranking found nothing alive to talk to.
    #[error("no reachable CDN hosts")]
    NoReachableHosts,
}

impl Error {
    /// The HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { code, .. } => Some(*code),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::NoReachableHosts => None,
        }
    }

    /// Whether this error means the resource does not exist, as opposed to
    /// a transient transport failure.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
