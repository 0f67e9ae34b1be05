//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content type of uploaded maps.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Options attached to a single upload.
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// MIME type stored with the object.
    pub content_type: String,
    /// `Cache-Control: max-age` for public reads, in seconds.
    pub cache_control_secs: u64,
    /// Overwrite an existing object under the same key.
    pub upsert: bool,
}

impl UploadOptions {
    /// Options for a map PDF: no upsert, one hour cache.
    pub fn pdf() -> Self {
        Self {
            content_type: PDF_CONTENT_TYPE.to_string(),
            cache_control_secs: 3600,
            upsert: false,
        }
    }

    /// Same options with a different content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Same options with a different cache max-age.
    pub fn with_cache_control(mut self, secs: u64) -> Self {
        self.cache_control_secs = secs;
        self
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::pdf()
    }
}

/// Bucket description returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub public: bool,
}

/// One object in a bucket listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub name: String,
    /// Size in bytes, when the backend reports it.
    pub size: Option<u64>,
}

/// Object store holding the uploaded map files of one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store an object.
    ///
    /// Without `upsert`, an existing key fails with
    /// [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists).
    async fn upload(&self, key: &str, data: Bytes, options: &UploadOptions) -> StorageResult<()>;

    /// Public URL under which a stored object is readable.
    fn public_url(&self, key: &str) -> String;

    /// Remove objects. Keys that do not exist are ignored.
    async fn remove(&self, keys: &[String]) -> StorageResult<()>;

    /// List the objects of the bucket.
    async fn list(&self) -> StorageResult<Vec<ObjectInfo>>;

    /// Describe the configured bucket, `None` when it does not exist.
    async fn bucket(&self) -> StorageResult<Option<BucketInfo>>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "hosted", "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
