//! Metadata store error types.

use mapas_core::BackendErrorKind;
use thiserror::Error;

/// Render an optional backend error code as a suffix of the status.
fn format_code(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(", {c}")).unwrap_or_default()
}

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend error ({status}{}): {message}", format_code(.code))]
    Backend {
        status: u16,
        code: Option<String>,
        kind: BackendErrorKind,
        message: String,
    },

    #[error("invalid row: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MetadataError {
    /// Classify the error for retry decisions and diagnostics.
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            MetadataError::NotFound(_) => BackendErrorKind::NotFound,
            MetadataError::AlreadyExists(_) => BackendErrorKind::Conflict,
            MetadataError::Database(e) => classify_sqlx(e),
            MetadataError::Http(e) if e.is_timeout() => BackendErrorKind::Timeout,
            MetadataError::Http(e) if e.is_connect() || e.is_request() => BackendErrorKind::Network,
            MetadataError::Http(_) => BackendErrorKind::Other,
            MetadataError::Backend { kind, .. } => *kind,
            MetadataError::Decode(_) | MetadataError::Config(_) => BackendErrorKind::Other,
        }
    }
}

fn classify_sqlx(e: &sqlx::Error) -> BackendErrorKind {
    match e {
        sqlx::Error::RowNotFound => BackendErrorKind::NotFound,
        sqlx::Error::PoolTimedOut => BackendErrorKind::Timeout,
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed => BackendErrorKind::Unavailable,
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() || db.is_foreign_key_violation() {
                BackendErrorKind::Conflict
            } else if db.message().contains("no such table") {
                BackendErrorKind::MissingTable
            } else {
                BackendErrorKind::Other
            }
        }
        _ => BackendErrorKind::Other,
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
