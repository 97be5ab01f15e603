use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("settings must be a JSON object, got {0}")]
    SettingsNotObject(String),

    #[error("invalid media type: {0:?}")]
    InvalidMediaType(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
