//! Service error types.

use mapas_core::{BackendErrorKind, GeolocationError};
use mapas_metadata::MetadataError;
use mapas_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the catalog services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected input. Never retried and never reaches the backend.
    #[error(transparent)]
    Validation(#[from] mapas_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("category {name:?} is used by {count} map(s)")]
    CategoryInUse { name: String, count: usize },

    #[error("select at least one file to upload")]
    NothingToUpload,

    #[error("no failed uploads to retry")]
    NothingToRetry,

    #[error("operation cancelled")]
    Cancelled,

    #[error("{}", .0.user_message())]
    Geolocation(GeolocationError),
}

impl ServiceError {
    /// Backend classification, when a backend was involved.
    pub fn kind(&self) -> Option<BackendErrorKind> {
        match self {
            ServiceError::Storage(e) => Some(e.kind()),
            ServiceError::Metadata(e) => Some(e.kind()),
            ServiceError::NotFound(_) => Some(BackendErrorKind::NotFound),
            _ => None,
        }
    }

    /// Whether the error was raised before any backend call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::CategoryInUse { .. }
                | ServiceError::NothingToUpload
                | ServiceError::NothingToRetry
        )
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure of one upload attempt.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("storage upload timed out after {}s", .0.as_secs())]
    StorageTimeout(Duration),

    #[error("saving the map record timed out after {}s", .0.as_secs())]
    MetadataTimeout(Duration),

    #[error("upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("saving the map record failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("cancelled")]
    Cancelled,

    #[error("entry was removed from the queue")]
    Withdrawn,
}

impl UploadError {
    /// Classify the failure.
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            UploadError::StorageTimeout(_) | UploadError::MetadataTimeout(_) => {
                BackendErrorKind::Timeout
            }
            UploadError::Storage(e) => e.kind(),
            UploadError::Metadata(e) => e.kind(),
            UploadError::Cancelled | UploadError::Withdrawn => BackendErrorKind::Other,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Setup problems (missing table or bucket, denied access) fail the
    /// same way on every attempt, so they end the loop early.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Cancelled | UploadError::Withdrawn => false,
            _ => !self.kind().is_configuration(),
        }
    }
}
