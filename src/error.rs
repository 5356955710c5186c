//! Error types for webstore

use hyper::StatusCode;
use thiserror::Error;

/// Message prefix carried by `Busy` responses.
///
/// The harness client matches on it to tell a write-in-flight apart from
/// other server failures.
pub const BUSY_MESSAGE: &str = "Blob is busy";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob is busy: {0} (write in progress)")]
    Busy(String),

    #[error("Envelope too short: {len} bytes, need at least {min}")]
    EnvelopeTooShort { len: usize, min: usize },

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// HTTP status the service answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::InvalidName(_) | StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}
