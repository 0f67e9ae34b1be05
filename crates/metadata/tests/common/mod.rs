pub mod fixtures;

use mapas_metadata::{MetadataResult, SqliteStore};
use tempfile::TempDir;

/// SQLite store in a temp directory that lives as long as the value.
pub struct TestMetadata {
    store: SqliteStore,
    _dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestMetadata {
    pub async fn in_memory() -> MetadataResult<Self> {
        Ok(Self {
            store: SqliteStore::in_memory().await?,
            _dir: None,
        })
    }

    pub async fn on_disk() -> MetadataResult<Self> {
        let dir = tempfile::tempdir()?;
        let store = SqliteStore::new(dir.path().join("metadata.db")).await?;
        Ok(Self {
            store,
            _dir: Some(dir),
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}
