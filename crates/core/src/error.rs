//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
///
/// Every variant is a validation failure: it is reported to the operator
/// as-is and never retried.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("latitude must be between -90 and 90, got {0}")]
    LatitudeOutOfRange(f64),

    #[error("longitude must be between -180 and 180, got {0}")]
    LongitudeOutOfRange(f64),

    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("a category named {0:?} already exists")]
    DuplicateCategory(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
