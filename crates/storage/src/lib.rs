//! Object storage for uploaded map files.
//!
//! This crate provides:
//! - The [`ObjectStore`] seam used by the uploader, catalog and diagnostics
//! - A hosted backend speaking the storage REST API
//! - A local filesystem backend for offline use and tests

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, hosted::HostedStorage};
pub use error::{StorageError, StorageResult};
pub use traits::{BucketInfo, ObjectInfo, ObjectStore, PDF_CONTENT_TYPE, UploadOptions};

use mapas_core::config::{BackendConfig, StorageConfig};
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(
    backend: &BackendConfig,
    config: &StorageConfig,
) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let store = FilesystemBackend::new(path, public_base_url.as_deref()).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Hosted { bucket } => {
            if backend.url.trim().is_empty() || backend.anon_key.trim().is_empty() {
                return Err(StorageError::Config(
                    "hosted storage requires backend.url and backend.anon_key".into(),
                ));
            }
            let store = HostedStorage::new(backend.base_url(), &backend.anon_key, bucket)?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn from_config_filesystem_ok() {
        let temp = tempdir().unwrap();
        let config = StorageConfig::Filesystem {
            path: temp.path().join("store"),
            public_base_url: None,
        };

        let store = from_config(&BackendConfig::default(), &config)
            .await
            .unwrap();
        store
            .upload("hello.pdf", Bytes::from_static(b"hi"), &UploadOptions::pdf())
            .await
            .unwrap();
        assert_eq!(store.backend_name(), "filesystem");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn from_config_hosted_ok() {
        let backend = BackendConfig {
            url: "https://example.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
        };
        let store = from_config(&backend, &StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(
            store.public_url("1_a.pdf"),
            "https://example.supabase.co/storage/v1/object/public/mapas/1_a.pdf"
        );
    }

    #[tokio::test]
    async fn from_config_hosted_requires_credentials() {
        match from_config(&BackendConfig::default(), &StorageConfig::default()).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::Config(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
