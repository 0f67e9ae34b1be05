//! Category repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use mapas_core::{Category, CategoryId};

/// Repository for the `categorias` table.
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    /// List all categories ordered by name.
    async fn list_categories(&self) -> MetadataResult<Vec<Category>>;

    /// Get a category by ID.
    async fn get_category(&self, id: CategoryId) -> MetadataResult<Option<Category>>;

    /// Insert a category and return the stored row.
    async fn insert_category(&self, name: &str) -> MetadataResult<Category>;

    /// Rename a category.
    async fn rename_category(&self, id: CategoryId, name: &str) -> MetadataResult<()>;

    /// Delete a category.
    async fn delete_category(&self, id: CategoryId) -> MetadataResult<()>;
}
