//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BucketInfo, ObjectInfo, ObjectStore, UploadOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Prefix of in-progress writes; such files are hidden from listings.
const TEMP_PREFIX: &str = ".tmp.";

/// Directory acting as a bucket. Keys are flat file names.
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root directory.
    ///
    /// Public URLs are `{public_base_url}/{key}`; without a base URL they
    /// point at the file itself (`file://`).
    pub async fn new(root: impl AsRef<Path>, public_base_url: Option<&str>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        let public_base_url = match public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("file://{}", root.display()),
        };
        Ok(Self {
            root,
            public_base_url,
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root.
    ///
    /// Keys must be a single normal path component. An existing entry is
    /// rejected when it resolves outside the root (symlinks).
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(StorageError::InvalidKey(format!(
                "not a plain object name: {key:?}"
            )));
        }

        let path = self.root.join(key);
        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {key}"))
                })?;
                if !target.starts_with(&self.root) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                Ok(path)
            }
            Ok(_) => Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Write `data` to a fresh temp file next to `path` and sync it.
    async fn write_temp(&self, path: &Path, data: &[u8]) -> StorageResult<PathBuf> {
        let temp_path = path.with_file_name(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        if let Err(e) = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await
        {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(temp_path)
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self, data, options), fields(backend = "filesystem", size = data.len()))]
    async fn upload(&self, key: &str, data: Bytes, options: &UploadOptions) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let temp_path = self.write_temp(&path, &data).await?;

        let result = if options.upsert {
            fs::rename(&temp_path, &path).await
        } else {
            // hard_link fails when the target exists, so the check and the
            // write are one atomic step.
            let linked = fs::hard_link(&temp_path, &path).await;
            let _ = fs::remove_file(&temp_path).await;
            linked
        };

        match result {
            Ok(()) => {
                debug!(key, "object stored");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(StorageError::Io(e))
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    #[instrument(skip(self), fields(backend = "filesystem", count = keys.len()))]
    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            let path = self.key_path(key)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(key = %key, "object already absent");
                }
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks.
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !file_type.is_file() || name.starts_with('.') {
                continue;
            }
            let size = entry.metadata().await.ok().map(|m| m.len());
            objects.push(ObjectInfo { name, size });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn bucket(&self) -> StorageResult<Option<BucketInfo>> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(Some(BucketInfo {
                name: self
                    .root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                public: true,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
