//! Storage error types.

use mapas_core::BackendErrorKind;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage backend error ({status}): {message}")]
    Backend {
        status: u16,
        kind: BackendErrorKind,
        message: String,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Classify the error for retry decisions and diagnostics.
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            StorageError::NotFound(_) => BackendErrorKind::NotFound,
            StorageError::AlreadyExists(_) => BackendErrorKind::Conflict,
            StorageError::BucketNotFound(_) => BackendErrorKind::MissingBucket,
            StorageError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                BackendErrorKind::PermissionDenied
            }
            StorageError::Io(_) => BackendErrorKind::Unavailable,
            StorageError::Http(e) if e.is_timeout() => BackendErrorKind::Timeout,
            StorageError::Http(e) if e.is_connect() || e.is_request() => BackendErrorKind::Network,
            StorageError::Http(_) => BackendErrorKind::Other,
            StorageError::Backend { kind, .. } => *kind,
            StorageError::InvalidKey(_) | StorageError::Config(_) => BackendErrorKind::Other,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
