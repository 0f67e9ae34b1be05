//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppInfo {
    /// Display name of the application.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Company owning the maps.
    #[serde(default = "default_company")]
    pub company: String,
}

fn default_app_name() -> String {
    "Mapas Branco Peres".to_string()
}

fn default_company() -> String {
    "Branco Peres".to_string()
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            company: default_company(),
        }
    }
}

/// Hosted backend connection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL (e.g., "https://xyzcompany.supabase.co").
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent with every request.
    /// WARNING: Prefer MAPAS_BACKEND__ANON_KEY over storing it in config files.
    #[serde(default)]
    pub anon_key: String,
}

impl BackendConfig {
    /// Project URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("backend.url is required for the hosted backend".to_string());
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!(
                "backend.url must start with http:// or https://, got {:?}",
                self.url
            ));
        }
        if self.anon_key.trim().is_empty() {
            return Err("backend.anon_key is required for the hosted backend".to_string());
        }
        Ok(())
    }
}

/// Object storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Hosted object storage bucket.
    Hosted {
        /// Bucket name.
        #[serde(default = "default_bucket")]
        bucket: String,
    },
    /// Local directory (offline use and tests).
    Filesystem {
        /// Root directory for stored files.
        path: PathBuf,
        /// Base URL under which the files are served. Defaults to a
        /// `file://` URL of the root directory.
        #[serde(default)]
        public_base_url: Option<String>,
    },
}

fn default_bucket() -> String {
    crate::DEFAULT_BUCKET.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Hosted {
            bucket: default_bucket(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Hosted { bucket } if bucket.trim().is_empty() => {
                Err("storage.bucket must not be empty".to_string())
            }
            StorageConfig::Filesystem { path, .. } if path.as_os_str().is_empty() => {
                Err("storage.path must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    fn is_hosted(&self) -> bool {
        matches!(self, StorageConfig::Hosted { .. })
    }

    /// Bucket (or directory) name shown in status reports.
    pub fn bucket_name(&self) -> String {
        match self {
            StorageConfig::Hosted { bucket } => bucket.clone(),
            StorageConfig::Filesystem { path, .. } => path.display().to_string(),
        }
    }
}

/// Metadata table configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// Hosted REST tables.
    #[default]
    Hosted,
    /// Local SQLite database (offline use and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl MetadataConfig {
    fn is_hosted(&self) -> bool {
        matches!(self, MetadataConfig::Hosted)
    }
}

/// Upload pipeline tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts per file before it is marked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Time box for the storage upload of one attempt, in seconds.
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,
    /// Time box for the metadata insert of one attempt, in seconds.
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    /// Cache-Control max-age sent with uploaded objects, in seconds.
    #[serde(default = "default_cache_control_secs")]
    pub cache_control_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_storage_timeout_secs() -> u64 {
    30
}

fn default_metadata_timeout_secs() -> u64 {
    15
}

fn default_cache_control_secs() -> u64 {
    3600
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            storage_timeout_secs: default_storage_timeout_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            cache_control_secs: default_cache_control_secs(),
        }
    }
}

impl UploadConfig {
    /// Get the retry delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Get the storage upload timeout as a Duration.
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    /// Get the metadata insert timeout as a Duration.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Validate upload tuning values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("upload.max_attempts must be at least 1".to_string());
        }
        if self.storage_timeout_secs == 0 || self.metadata_timeout_secs == 0 {
            return Err("upload timeouts must be at least 1 second".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application identity.
    #[serde(default)]
    pub app: AppInfo,
    /// Hosted backend connection.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata table configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Upload pipeline tuning.
    #[serde(default)]
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Create a local configuration rooted at `dir`.
    ///
    /// **For testing and offline use.** Uses filesystem storage and SQLite
    /// metadata, so no hosted backend is contacted.
    pub fn local(dir: &Path) -> Self {
        Self {
            app: AppInfo::default(),
            backend: BackendConfig::default(),
            storage: StorageConfig::Filesystem {
                path: dir.join("storage"),
                public_base_url: None,
            },
            metadata: MetadataConfig::Sqlite {
                path: dir.join("metadata.db"),
            },
            upload: UploadConfig::default(),
        }
    }

    /// Startup check: every required value must be present.
    pub fn validate(&self) -> Result<(), String> {
        if self.app.name.trim().is_empty() {
            return Err("app.name must not be empty".to_string());
        }
        if self.storage.is_hosted() || self.metadata.is_hosted() {
            self.backend.validate()?;
        }
        self.storage.validate()?;
        self.upload.validate()?;
        Ok(())
    }
}
