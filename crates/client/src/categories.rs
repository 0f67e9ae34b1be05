//! Category management.

use crate::error::{ServiceError, ServiceResult};
use mapas_core::category::{DEFAULT_CATEGORIES, validate_category_name};
use mapas_core::{Category, CategoryId};
use mapas_metadata::{MetadataError, MetadataStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// A category with the number of maps referencing it.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryUsage {
    pub category: Category,
    pub maps: usize,
}

/// Add, rename and delete categories under the naming rules.
pub struct CategoryManager {
    metadata: Arc<dyn MetadataStore>,
}

impl CategoryManager {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// All categories, ordered by name.
    pub async fn list(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.metadata.list_categories().await?)
    }

    /// All categories with their map counts.
    pub async fn list_with_usage(&self) -> ServiceResult<Vec<CategoryUsage>> {
        let categories = self.metadata.list_categories().await?;
        let mut counts: HashMap<CategoryId, usize> = HashMap::new();
        for id in self.metadata.category_references().await?.into_iter().flatten() {
            *counts.entry(id).or_default() += 1;
        }
        Ok(categories
            .into_iter()
            .map(|category| CategoryUsage {
                maps: counts.get(&category.id).copied().unwrap_or(0),
                category,
            })
            .collect())
    }

    /// Add a category. The name is trimmed and must not match an existing
    /// one, ignoring case.
    #[instrument(skip(self))]
    pub async fn add(&self, name: &str) -> ServiceResult<Category> {
        let existing = self.metadata.list_categories().await?;
        let name = validate_category_name(name, &existing, None)?;
        let category = self
            .metadata
            .insert_category(&name)
            .await
            .map_err(|e| duplicate_or(e, &name))?;
        info!(id = %category.id, "category added");
        Ok(category)
    }

    /// Rename a category under the same rules as [`add`](Self::add); the
    /// category itself is excluded from the duplicate check.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: CategoryId, name: &str) -> ServiceResult<Category> {
        let existing = self.metadata.list_categories().await?;
        let Some(current) = existing.iter().find(|c| c.id == id).cloned() else {
            return Err(ServiceError::NotFound(format!("category {id}")));
        };
        let name = validate_category_name(name, &existing, Some(id))?;
        self.metadata
            .rename_category(id, &name)
            .await
            .map_err(|e| duplicate_or(e, &name))?;
        info!(from = %current.name, to = %name, "category renamed");
        Ok(Category { name, ..current })
    }

    /// Delete a category that no map references.
    ///
    /// The reference count is taken from the live map rows; when it is not
    /// zero nothing is deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> ServiceResult<()> {
        let category = self
            .metadata
            .get_category(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {id}")))?;

        let count = self.reference_count(id).await?;
        if count > 0 {
            return Err(ServiceError::CategoryInUse {
                name: category.name,
                count,
            });
        }

        self.metadata.delete_category(id).await?;
        info!(name = %category.name, "category deleted");
        Ok(())
    }

    /// Number of maps referencing `id`.
    pub async fn reference_count(&self, id: CategoryId) -> ServiceResult<usize> {
        Ok(self
            .metadata
            .category_references()
            .await?
            .into_iter()
            .filter(|reference| *reference == Some(id))
            .count())
    }

    /// Add the default categories that are missing. Returns the added ones.
    pub async fn seed_defaults(&self) -> ServiceResult<Vec<Category>> {
        let mut existing = self.metadata.list_categories().await?;
        let mut added = Vec::new();
        for name in DEFAULT_CATEGORIES {
            if validate_category_name(name, &existing, None).is_err() {
                continue;
            }
            let category = self.metadata.insert_category(name).await?;
            existing.push(category.clone());
            added.push(category);
        }
        if !added.is_empty() {
            info!(added = added.len(), "default categories added");
        }
        Ok(added)
    }
}

/// A backend unique violation means another client took the name first.
fn duplicate_or(err: MetadataError, name: &str) -> ServiceError {
    match err {
        MetadataError::AlreadyExists(_) => {
            mapas_core::Error::DuplicateCategory(name.to_string()).into()
        }
        other => other.into(),
    }
}
