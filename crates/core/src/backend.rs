//! Classification of hosted backend failures.
//!
//! Both the storage and the table clients map raw HTTP failures onto
//! [`BackendErrorKind`] so callers (the upload retry loop, diagnostics)
//! branch on a typed value instead of matching error text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What went wrong when talking to the hosted backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The table does not exist (schema was never created).
    MissingTable,
    /// The storage bucket does not exist.
    MissingBucket,
    /// Rejected by a row-level security policy or missing grant.
    PermissionDenied,
    /// Unique constraint or existing object.
    Conflict,
    /// The addressed row or object does not exist.
    NotFound,
    /// The request did not complete in time.
    Timeout,
    /// Connection-level failure (DNS, TLS, reset).
    Network,
    /// The backend answered with a server error.
    Unavailable,
    /// The request was malformed or rejected for another reason.
    Other,
}

impl BackendErrorKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTable => "missing_table",
            Self::MissingBucket => "missing_bucket",
            Self::PermissionDenied => "permission_denied",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        }
    }

    /// Whether retrying the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network | Self::Unavailable)
    }

    /// Whether the failure points at backend setup rather than the request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingTable | Self::MissingBucket | Self::PermissionDenied
        )
    }

    /// Classify a failed response.
    ///
    /// `code` is the backend error code when the body carried one
    /// (Postgres SQLSTATE such as `42P01`, or a REST gateway code such as
    /// `PGRST205`). `message` is the human-readable error text.
    pub fn classify(status: u16, code: Option<&str>, message: &str) -> Self {
        match code {
            Some("42P01") | Some("PGRST205") | Some("PGRST106") => return Self::MissingTable,
            Some("42501") => return Self::PermissionDenied,
            Some("23505") => return Self::Conflict,
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("bucket not found") {
            return Self::MissingBucket;
        }
        if lower.contains("row-level security")
            || lower.contains("policy")
            || lower.contains("permission")
        {
            return Self::PermissionDenied;
        }
        if lower.contains("does not exist") && lower.contains("relation") {
            return Self::MissingTable;
        }
        if lower.contains("already exists") || lower.contains("duplicate") {
            return Self::Conflict;
        }

        match status {
            401 | 403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            409 => Self::Conflict,
            500..=599 => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(
            BackendErrorKind::classify(404, Some("42P01"), "relation \"maps\" does not exist"),
            BackendErrorKind::MissingTable
        );
        assert_eq!(
            BackendErrorKind::classify(404, Some("PGRST205"), "Could not find the table"),
            BackendErrorKind::MissingTable
        );
        assert_eq!(
            BackendErrorKind::classify(403, Some("42501"), "denied"),
            BackendErrorKind::PermissionDenied
        );
        assert_eq!(
            BackendErrorKind::classify(409, Some("23505"), "duplicate key"),
            BackendErrorKind::Conflict
        );
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(
            BackendErrorKind::classify(
                400,
                None,
                "new row violates row-level security policy for table \"categorias\""
            ),
            BackendErrorKind::PermissionDenied
        );
        assert_eq!(
            BackendErrorKind::classify(400, None, "Bucket not found"),
            BackendErrorKind::MissingBucket
        );
        assert_eq!(
            BackendErrorKind::classify(400, None, "The resource already exists"),
            BackendErrorKind::Conflict
        );
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(
            BackendErrorKind::classify(401, None, "Invalid API key"),
            BackendErrorKind::PermissionDenied
        );
        assert_eq!(
            BackendErrorKind::classify(404, None, "Object not found"),
            BackendErrorKind::NotFound
        );
        assert_eq!(
            BackendErrorKind::classify(503, None, "upstream unavailable"),
            BackendErrorKind::Unavailable
        );
        assert_eq!(
            BackendErrorKind::classify(422, None, "bad input"),
            BackendErrorKind::Other
        );
    }

    #[test]
    fn test_kind_flags() {
        assert!(BackendErrorKind::Timeout.is_transient());
        assert!(BackendErrorKind::Network.is_transient());
        assert!(!BackendErrorKind::PermissionDenied.is_transient());
        assert!(BackendErrorKind::MissingBucket.is_configuration());
        assert!(!BackendErrorKind::Conflict.is_configuration());
    }
}
