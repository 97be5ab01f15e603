use prov_pool::PoolError;
use prov_source::{DownloadError, SourceError};
use prov_types::{DecodeError, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The input cannot be read: unsupported, or missing the bytes an
    /// operation needs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session was disposed before or while the operation ran.
    #[error("session disposed")]
    PoolDisposed,

    #[error("pool error: {0}")]
    Pool(PoolError),

    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// The decode engine failed in a way recovery does not handle. Carries
    /// the engine's error unmodified.
    #[error("decode error: {0}")]
    Decode(DecodeError),

    #[error("manifest store builder failed: {0}")]
    Builder(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("settings error: {0}")]
    Settings(#[from] TypeError),
}

impl From<PoolError> for SessionError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Disposed => Self::PoolDisposed,
            PoolError::Decode(decode) => Self::Decode(decode),
            other => Self::Pool(other),
        }
    }
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

impl From<SourceError> for SessionError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidInput(reason) => Self::InvalidInput(reason),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_pool_surfaces_as_disposed_session() {
        assert!(matches!(
            SessionError::from(PoolError::Disposed),
            SessionError::PoolDisposed
        ));
    }

    #[test]
    fn decode_failures_keep_their_typed_error() {
        let engine = DecodeError::Engine {
            name: "Toolkit(Signature)".into(),
            message: "bad".into(),
        };
        match SessionError::from(PoolError::Decode(engine.clone())) {
            SessionError::Decode(inner) => assert_eq!(inner, engine),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_pool_errors_wrap() {
        let err = SessionError::from(PoolError::QueueFull { capacity: 1 });
        assert!(matches!(err, SessionError::Pool(PoolError::QueueFull { capacity: 1 })));
    }
}
