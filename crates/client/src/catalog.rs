//! Browsing and bulk editing of stored maps.

use crate::Backend;
use crate::error::{ServiceError, ServiceResult};
use mapas_core::{Annotation, Category, CategoryId, MapId, MapRecord};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

/// Label shown for maps without a known category.
pub const UNCATEGORIZED: &str = "Sem categoria";

/// Criteria for narrowing the map list.
#[derive(Clone, Debug, Default)]
pub struct MapFilter {
    /// Case-insensitive substring of the name or the farm.
    pub query: String,
    pub category: Option<CategoryId>,
    /// Exact farm label.
    pub farm: Option<String>,
}

impl MapFilter {
    pub fn matches(&self, map: &MapRecord) -> bool {
        map.matches_search(&self.query)
            && self.category.is_none_or(|c| map.category_id == Some(c))
            && self.farm.as_deref().is_none_or(|f| map.farm == f)
    }
}

/// Maps matching `filter`, in their original order.
pub fn filter_maps<'a>(maps: &'a [MapRecord], filter: &MapFilter) -> Vec<&'a MapRecord> {
    maps.iter().filter(|m| filter.matches(m)).collect()
}

/// Distinct farm labels, sorted.
pub fn farms(maps: &[MapRecord]) -> Vec<String> {
    maps.iter()
        .map(|m| m.farm.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Display name of a category reference.
pub fn category_name(categories: &[Category], id: Option<CategoryId>) -> &str {
    id.and_then(|id| categories.iter().find(|c| c.id == id))
        .map(|c| c.name.as_str())
        .unwrap_or(UNCATEGORIZED)
}

/// Read and edit stored maps.
pub struct MapCatalog {
    backend: Backend,
}

impl MapCatalog {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Every map, newest first.
    pub async fn list(&self) -> ServiceResult<Vec<MapRecord>> {
        Ok(self.backend.metadata.list_maps().await?)
    }

    /// Maps matching `filter`, newest first.
    pub async fn search(&self, filter: &MapFilter) -> ServiceResult<Vec<MapRecord>> {
        let maps = self.list().await?;
        Ok(maps.into_iter().filter(|m| filter.matches(m)).collect())
    }

    pub async fn get(&self, id: MapId) -> ServiceResult<MapRecord> {
        self.backend
            .metadata
            .get_map(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("map {id}")))
    }

    /// Move the selected maps to `category` in one update.
    #[instrument(skip(self, ids), fields(maps = ids.len()))]
    pub async fn recategorize(
        &self,
        ids: &[MapId],
        category: Option<CategoryId>,
    ) -> ServiceResult<u64> {
        if ids.is_empty() {
            return Err(mapas_core::Error::Required {
                field: "map selection",
            }
            .into());
        }
        let category = category.ok_or(mapas_core::Error::Required { field: "category" })?;

        let updated = self.backend.metadata.set_category(ids, category).await?;
        info!(%category, updated, "maps recategorized");
        Ok(updated)
    }

    /// Delete a map and its stored file.
    ///
    /// The file is removed first and its failure only logged, so a missing
    /// or unreachable object never leaves the row behind.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: MapId) -> ServiceResult<MapRecord> {
        let map = self.get(id).await?;

        match map.object_key() {
            Some(key) => {
                if let Err(err) = self.backend.storage.remove(&[key.to_string()]).await {
                    warn!(%key, error = %err, "failed to remove stored file");
                }
            }
            None => warn!(url = %map.file_url, "file URL has no object key"),
        }

        self.backend.metadata.delete_map(id).await?;
        info!(name = %map.name, "map deleted");
        Ok(map)
    }

    /// Store an annotation snapshot on a map.
    #[instrument(skip(self, annotation))]
    pub async fn save_annotations(&self, id: MapId, annotation: &Annotation) -> ServiceResult<()> {
        self.backend
            .metadata
            .update_annotations(id, &annotation.to_value())
            .await
            .map_err(|e| match e {
                mapas_metadata::MetadataError::NotFound(_) => {
                    ServiceError::NotFound(format!("map {id}"))
                }
                other => other.into(),
            })?;
        info!(map = %id, "annotations saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn map(name: &str, farm: &str, category: Option<CategoryId>) -> MapRecord {
        MapRecord {
            id: MapId::new(),
            name: name.to_string(),
            farm: farm.to_string(),
            category_id: category,
            file_url: format!("http://files.test/mapas/{name}.pdf"),
            annotations: serde_json::json!({}),
            latitude: None,
            longitude: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_filter_by_query_and_category() {
        let plantio = CategoryId::new();
        let maps = vec![
            map("Talhao Norte", "Santa Rita", Some(plantio)),
            map("Talhao Sul", "Boa Vista", None),
            map("Sede", "Santa Rita", None),
        ];

        let filter = MapFilter {
            query: "santa".into(),
            ..MapFilter::default()
        };
        assert_eq!(filter_maps(&maps, &filter).len(), 2);

        let filter = MapFilter {
            query: "TALHAO".into(),
            category: Some(plantio),
            ..MapFilter::default()
        };
        let found = filter_maps(&maps, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Talhao Norte");

        let filter = MapFilter {
            farm: Some("Santa".into()),
            ..MapFilter::default()
        };
        assert!(filter_maps(&maps, &filter).is_empty());
    }

    #[test]
    fn test_farms_are_unique_and_sorted() {
        let maps = vec![
            map("a", "Santa Rita", None),
            map("b", "Boa Vista", None),
            map("c", "Santa Rita", None),
        ];
        assert_eq!(farms(&maps), vec!["Boa Vista", "Santa Rita"]);
    }

    #[test]
    fn test_category_name_fallback() {
        let category = Category {
            id: CategoryId::new(),
            name: "Colheita".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let categories = vec![category.clone()];
        assert_eq!(category_name(&categories, Some(category.id)), "Colheita");
        assert_eq!(category_name(&categories, Some(CategoryId::new())), UNCATEGORIZED);
        assert_eq!(category_name(&categories, None), UNCATEGORIZED);
    }
}
