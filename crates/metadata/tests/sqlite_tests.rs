//! Integration tests for the SQLite metadata store.

mod common;

use common::TestMetadata;
use common::fixtures::{file_url, new_map};
use mapas_core::{BackendErrorKind, CategoryId, CoordinateUpdate, MapId};
use mapas_metadata::{CategoryRepo, MapRepo, MetadataError, MetadataStore};
use serde_json::json;

#[tokio::test]
async fn test_category_crud() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let plantio = store.insert_category("Plantio").await.unwrap();
    store.insert_category("colheita").await.unwrap();
    store.insert_category("Irrigação").await.unwrap();

    let names: Vec<_> = store
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["colheita", "Irrigação", "Plantio"]);

    store
        .rename_category(plantio.id, "Plantio de soja")
        .await
        .unwrap();
    let renamed = store.get_category(plantio.id).await.unwrap().unwrap();
    assert_eq!(renamed.name, "Plantio de soja");

    store.delete_category(plantio.id).await.unwrap();
    assert!(store.get_category(plantio.id).await.unwrap().is_none());
    assert!(matches!(
        store.delete_category(plantio.id).await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_category_name_rejected() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    store.insert_category("Plantio").await.unwrap();
    let err = store.insert_category("PLANTIO").await.unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)), "{err:?}");
    assert_eq!(err.kind(), BackendErrorKind::Conflict);
}

#[tokio::test]
async fn test_seed_default_categories_is_idempotent() {
    let metadata = TestMetadata::on_disk().await.unwrap();
    let store = metadata.store();

    assert_eq!(store.seed_default_categories().await.unwrap(), 6);
    assert_eq!(store.seed_default_categories().await.unwrap(), 0);
    assert_eq!(store.list_categories().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_maps_listed_newest_first() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let first = store.insert_map(&new_map("Talhao 1", "Santa Rita", None)).await.unwrap();
    let second = store.insert_map(&new_map("Talhao 2", "Boa Vista", None)).await.unwrap();

    let maps = store.list_maps().await.unwrap();
    let ids: Vec<MapId> = maps.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(!maps[0].has_annotations());
}

#[tokio::test]
async fn test_find_by_file_url() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let map = store.insert_map(&new_map("Talhao 7", "Santa Rita", None)).await.unwrap();
    let found = store
        .find_map_by_file_url(&map.file_url)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, map.id);
    assert!(
        store
            .find_map_by_file_url(&file_url("other.pdf"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_coordinates_and_annotations() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let map = store.insert_map(&new_map("Talhao 3", "Boa Vista", None)).await.unwrap();

    let update = CoordinateUpdate::parse("-22.9", "-47.06").unwrap();
    store.update_coordinates(map.id, update).await.unwrap();
    let stored = store.get_map(map.id).await.unwrap().unwrap();
    assert_eq!(stored.latitude, Some(-22.9));
    assert_eq!(stored.longitude, Some(-47.06));

    store
        .update_coordinates(map.id, CoordinateUpdate::cleared())
        .await
        .unwrap();
    let stored = store.get_map(map.id).await.unwrap().unwrap();
    assert!(stored.latitude.is_none() && stored.longitude.is_none());

    let snapshot = json!({
        "imageData": "data:image/png;base64,iVBORw0KGgo=",
        "timestamp": "2025-07-05T12:00:00Z"
    });
    store.update_annotations(map.id, &snapshot).await.unwrap();
    let stored = store.get_map(map.id).await.unwrap().unwrap();
    assert_eq!(stored.annotations, snapshot);

    assert!(matches!(
        store
            .update_coordinates(MapId::new(), CoordinateUpdate::cleared())
            .await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_set_category_and_references() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let colheita = store.insert_category("Colheita").await.unwrap();

    let a = store.insert_map(&new_map("A", "Santa Rita", None)).await.unwrap();
    let b = store.insert_map(&new_map("B", "Santa Rita", None)).await.unwrap();
    store.insert_map(&new_map("C", "Boa Vista", None)).await.unwrap();

    let updated = store
        .set_category(&[a.id, b.id, MapId::new()], colheita.id)
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let references = store.category_references().await.unwrap();
    assert_eq!(references.len(), 3);
    assert_eq!(
        references
            .iter()
            .filter(|r| **r == Some(colheita.id))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_referenced_category_cannot_be_deleted() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let outros = store.insert_category("Outros").await.unwrap();
    store
        .insert_map(&new_map("Mapa", "Santa Rita", Some(outros.id)))
        .await
        .unwrap();

    let err = store.delete_category(outros.id).await.unwrap_err();
    assert_eq!(err.kind(), BackendErrorKind::Conflict);
    assert!(store.get_category(outros.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unknown_category_reference_rejected() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();

    let err = store
        .insert_map(&new_map("Mapa", "Santa Rita", Some(CategoryId::new())))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), BackendErrorKind::Conflict);
}

#[tokio::test]
async fn test_delete_map() {
    let metadata = TestMetadata::in_memory().await.unwrap();
    let store = metadata.store();
    let map = store.insert_map(&new_map("Mapa", "Santa Rita", None)).await.unwrap();

    store.delete_map(map.id).await.unwrap();
    assert!(store.get_map(map.id).await.unwrap().is_none());
    store.health_check().await.unwrap();
}
