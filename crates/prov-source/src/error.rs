use thiserror::Error;

/// Errors produced while downloading.
///
/// [`DownloadError::InvalidUrl`] is kept apart from every other failure: a
/// URL that cannot even be parsed means there is nothing to fetch, which
/// callers treat differently from a fetch that was tried and failed.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

impl DownloadError {
    /// Returns `true` when the URL itself was unusable.
    pub fn is_invalid_url(&self) -> bool {
        matches!(self, Self::InvalidUrl { .. })
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors produced while building a source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The input is of a kind the reader does not handle.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type SourceResult<T> = Result<T, SourceError>;
