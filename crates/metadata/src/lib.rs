//! Metadata tables of the map catalog.
//!
//! This crate provides:
//! - Repository traits for the `categorias` and `maps` tables
//! - [`RestStore`], the hosted tables behind the REST gateway
//! - [`SqliteStore`], a local database with the same schema

pub mod error;
pub mod models;
pub mod repos;
pub mod rest;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{CategoryRepo, MapRepo};
pub use rest::RestStore;
pub use store::{MetadataStore, SqliteStore};

use mapas_core::config::{BackendConfig, MetadataConfig};
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(
    backend: &BackendConfig,
    config: &MetadataConfig,
) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Hosted => {
            if backend.url.trim().is_empty() || backend.anon_key.trim().is_empty() {
                return Err(MetadataError::Config(
                    "hosted metadata requires backend.url and backend.anon_key".to_string(),
                ));
            }
            tracing::info!(url = %backend.base_url(), "using hosted tables");
            let store = RestStore::new(backend.base_url(), &backend.anon_key)?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("metadata.db");
        let config = MetadataConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&BackendConfig::default(), &config)
            .await
            .unwrap();
        store.health_check().await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_from_config_hosted_requires_credentials() {
        let result = from_config(&BackendConfig::default(), &MetadataConfig::Hosted).await;
        assert!(matches!(result, Err(MetadataError::Config(_))));
    }
}
