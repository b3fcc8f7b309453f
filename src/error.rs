//! Error types for appointments-node.

use crate::storage::StoreError;
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in appointments-node.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Backend store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}
