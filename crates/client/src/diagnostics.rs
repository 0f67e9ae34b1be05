//! Backend setup checks.
//!
//! [`Diagnostics::status`] runs read-only checks suitable for a status
//! panel. [`Diagnostics::run`] runs the full probe sequence, including a
//! throw-away category insert and a small test upload. Failures carry a
//! [`Remediation`] naming the setup script that fixes them, chosen from the
//! typed [`BackendErrorKind`] of the error.

use crate::Backend;
use bytes::Bytes;
use mapas_core::BackendErrorKind;
use mapas_core::category::DEFAULT_CATEGORIES;
use mapas_storage::UploadOptions;
use std::fmt;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const TABLES_SQL: &str = include_str!("sql/tables.sql");
const STORAGE_SQL: &str = include_str!("sql/storage.sql");
const PERMISSIONS_SQL: &str = include_str!("sql/permissions.sql");
const VERIFY_SQL: &str = include_str!("sql/verify.sql");

/// Outcome of one check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "ok",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Setup script fixing a class of failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Remediation {
    /// Create the tables and seed the default categories.
    Tables,
    /// Create the public bucket and its access policies.
    Storage,
    /// Grant table access to the API role.
    Permissions,
}

impl Remediation {
    pub const ALL: [Remediation; 3] = [
        Remediation::Tables,
        Remediation::Storage,
        Remediation::Permissions,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Remediation::Tables => "Create tables",
            Remediation::Storage => "Configure storage",
            Remediation::Permissions => "Fix table permissions",
        }
    }

    /// SQL script for `bucket`.
    pub fn script(&self, bucket: &str) -> String {
        let template = match self {
            Remediation::Tables => TABLES_SQL,
            Remediation::Storage => STORAGE_SQL,
            Remediation::Permissions => PERMISSIONS_SQL,
        };
        template.replace("{bucket}", bucket)
    }

    /// Script for a failure of `kind` in a table probe.
    fn for_tables(kind: BackendErrorKind) -> Option<Self> {
        match kind {
            BackendErrorKind::MissingTable => Some(Remediation::Tables),
            BackendErrorKind::PermissionDenied => Some(Remediation::Permissions),
            _ => None,
        }
    }

    /// Script for a failure of `kind` in a storage probe.
    fn for_storage(kind: BackendErrorKind) -> Option<Self> {
        match kind {
            BackendErrorKind::MissingBucket | BackendErrorKind::PermissionDenied => {
                Some(Remediation::Storage)
            }
            _ => None,
        }
    }
}

/// Read-only queries checking the whole setup by hand.
pub fn verification_script(bucket: &str) -> String {
    VERIFY_SQL.replace("{bucket}", bucket)
}

/// Result of one check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub kind: Option<BackendErrorKind>,
    pub remediation: Option<Remediation>,
}

impl CheckResult {
    fn success(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Success,
            message: message.into(),
            kind: None,
            remediation: None,
        }
    }

    fn warning(name: &'static str, message: impl Into<String>, remediation: Remediation) -> Self {
        Self {
            name,
            status: CheckStatus::Warning,
            message: message.into(),
            kind: None,
            remediation: Some(remediation),
        }
    }

    fn error(
        name: &'static str,
        message: impl Into<String>,
        kind: Option<BackendErrorKind>,
        remediation: Option<Remediation>,
    ) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            message: message.into(),
            kind,
            remediation,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckStatus::Success
    }
}

/// Distinct remediations of a result set, in [`Remediation::ALL`] order.
pub fn remediations(results: &[CheckResult]) -> Vec<Remediation> {
    Remediation::ALL
        .into_iter()
        .filter(|r| results.iter().any(|c| c.remediation == Some(*r)))
        .collect()
}

/// Probe the configured backend.
pub struct Diagnostics {
    backend: Backend,
    bucket: String,
}

impl Diagnostics {
    pub fn new(backend: Backend, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Read-only status: connection, tables, bucket, categories.
    pub async fn status(&self) -> Vec<CheckResult> {
        let metadata = self.backend.metadata.health_check().await;

        let connection = match &metadata {
            Err(err) if !matches!(err.kind(), BackendErrorKind::MissingTable) => {
                CheckResult::error("Connection", err.to_string(), Some(err.kind()), None)
            }
            _ => CheckResult::success(
                "Connection",
                format!("connected ({})", self.backend.metadata.backend_name()),
            ),
        };

        let tables = match &metadata {
            Ok(()) => CheckResult::success("Tables", "tables found"),
            Err(err) => CheckResult::error(
                "Tables",
                err.to_string(),
                Some(err.kind()),
                Remediation::for_tables(err.kind()),
            ),
        };

        let bucket = self.check_bucket().await;

        let categories = match self.backend.metadata.list_categories().await {
            Ok(list) if !list.is_empty() => {
                CheckResult::success("Categories", format!("{} categories found", list.len()))
            }
            Ok(_) => CheckResult::warning("Categories", "no categories found", Remediation::Tables),
            Err(err) => CheckResult::error(
                "Categories",
                err.to_string(),
                Some(err.kind()),
                Remediation::for_tables(err.kind()),
            ),
        };

        vec![connection, tables, bucket, categories]
    }

    /// Full probe sequence. Every probe runs even when earlier ones fail.
    pub async fn run(&self) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(6);
        results.push(self.probe_tables().await);
        results.push(self.probe_default_categories().await);
        results.push(self.check_bucket().await);
        results.push(self.probe_bucket_access().await);
        results.push(self.probe_insert().await);
        results.push(self.probe_upload().await);

        for result in &results {
            match result.status {
                CheckStatus::Success => debug!(check = result.name, "{}", result.message),
                CheckStatus::Warning => warn!(check = result.name, "{}", result.message),
                CheckStatus::Error => warn!(
                    check = result.name,
                    kind = ?result.kind,
                    "{}",
                    result.message
                ),
            }
        }
        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(checks = results.len(), failed, "diagnostics finished");
        results
    }

    async fn probe_tables(&self) -> CheckResult {
        match self.backend.metadata.health_check().await {
            Ok(()) => CheckResult::success("Tables", "tables found"),
            Err(err) => CheckResult::error(
                "Tables",
                err.to_string(),
                Some(err.kind()),
                Remediation::for_tables(err.kind()),
            ),
        }
    }

    async fn probe_default_categories(&self) -> CheckResult {
        const NAME: &str = "Default categories";
        match self.backend.metadata.list_categories().await {
            Ok(list) if list.len() >= DEFAULT_CATEGORIES.len() => {
                CheckResult::success(NAME, format!("{} categories found", list.len()))
            }
            Ok(list) => CheckResult::warning(
                NAME,
                format!("only {} categories found", list.len()),
                Remediation::Tables,
            ),
            Err(err) => CheckResult::error(
                NAME,
                err.to_string(),
                Some(err.kind()),
                Remediation::for_tables(err.kind()),
            ),
        }
    }

    async fn check_bucket(&self) -> CheckResult {
        const NAME: &str = "Bucket";
        match self.backend.storage.bucket().await {
            Ok(Some(info)) => CheckResult::success(
                NAME,
                format!(
                    "bucket '{}' found (public: {})",
                    info.name,
                    if info.public { "yes" } else { "no" }
                ),
            ),
            Ok(None) => CheckResult::error(
                NAME,
                format!("bucket '{}' not found", self.bucket),
                Some(BackendErrorKind::MissingBucket),
                Some(Remediation::Storage),
            ),
            Err(err) => CheckResult::error(
                NAME,
                err.to_string(),
                Some(err.kind()),
                Remediation::for_storage(err.kind()),
            ),
        }
    }

    async fn probe_bucket_access(&self) -> CheckResult {
        const NAME: &str = "Bucket access";
        match self.backend.storage.list().await {
            Ok(objects) => {
                CheckResult::success(NAME, format!("access ok ({} files)", objects.len()))
            }
            Err(err) => CheckResult::error(
                NAME,
                format!("cannot list bucket: {err}"),
                Some(err.kind()),
                Remediation::for_storage(err.kind()),
            ),
        }
    }

    async fn probe_insert(&self) -> CheckResult {
        const NAME: &str = "Insert";
        let name = format!("Teste-{}", now_ms());
        let category = match self.backend.metadata.insert_category(&name).await {
            Ok(category) => category,
            Err(err) => {
                let message = match err.kind() {
                    BackendErrorKind::PermissionDenied => {
                        "blocked by row-level security or missing grants".to_string()
                    }
                    _ => err.to_string(),
                };
                return CheckResult::error(
                    NAME,
                    message,
                    Some(err.kind()),
                    Remediation::for_tables(err.kind()),
                );
            }
        };

        match self.backend.metadata.delete_category(category.id).await {
            Ok(()) => CheckResult::success(NAME, "insert and delete work"),
            Err(err) => CheckResult {
                kind: Some(err.kind()),
                ..CheckResult::warning(
                    NAME,
                    format!("inserted probe category '{name}' but could not delete it: {err}"),
                    Remediation::Permissions,
                )
            },
        }
    }

    async fn probe_upload(&self) -> CheckResult {
        const NAME: &str = "Upload";
        let key = format!("test-{}.txt", now_ms());
        let options = UploadOptions::default().with_content_type("text/plain");

        if let Err(err) = self
            .backend
            .storage
            .upload(&key, Bytes::from_static(b"test content"), &options)
            .await
        {
            return CheckResult::error(
                NAME,
                format!("upload failed: {err}"),
                Some(err.kind()),
                Remediation::for_storage(err.kind()),
            );
        }

        match self.backend.storage.remove(std::slice::from_ref(&key)).await {
            Ok(()) => CheckResult::success(NAME, "upload and removal work"),
            Err(err) => CheckResult {
                kind: Some(err.kind()),
                ..CheckResult::warning(
                    NAME,
                    format!("uploaded '{key}' but could not remove it: {err}"),
                    Remediation::Storage,
                )
            },
        }
    }
}

fn now_ms() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
