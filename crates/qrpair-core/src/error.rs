//! Error types for qrpair

use thiserror::Error;

/// Main error type for qrpair operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using qrpair's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a TLS error from any displayable cause
    pub fn tls(cause: impl std::fmt::Display) -> Self {
        Error::Tls(cause.to_string())
    }
}
