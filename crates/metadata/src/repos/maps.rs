//! Map repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use mapas_core::{CategoryId, CoordinateUpdate, MapId, MapRecord, NewMap};

/// Repository for the `maps` table.
#[async_trait]
pub trait MapRepo: Send + Sync {
    /// List all maps, newest first.
    async fn list_maps(&self) -> MetadataResult<Vec<MapRecord>>;

    /// Get a map by ID.
    async fn get_map(&self, id: MapId) -> MetadataResult<Option<MapRecord>>;

    /// Find the map recorded for a public file URL.
    async fn find_map_by_file_url(&self, file_url: &str) -> MetadataResult<Option<MapRecord>>;

    /// Insert a map row and return it.
    async fn insert_map(&self, map: &NewMap) -> MetadataResult<MapRecord>;

    /// Set or clear both coordinate columns in one update.
    async fn update_coordinates(&self, id: MapId, update: CoordinateUpdate) -> MetadataResult<()>;

    /// Replace the annotation blob.
    async fn update_annotations(
        &self,
        id: MapId,
        annotations: &serde_json::Value,
    ) -> MetadataResult<()>;

    /// Point every listed map at `category`. Returns the number of rows updated.
    async fn set_category(&self, ids: &[MapId], category: CategoryId) -> MetadataResult<u64>;

    /// Delete a map row.
    async fn delete_map(&self, id: MapId) -> MetadataResult<()>;

    /// The category reference of every map row.
    async fn category_references(&self) -> MetadataResult<Vec<Option<CategoryId>>>;
}
