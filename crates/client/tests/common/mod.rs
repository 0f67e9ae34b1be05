#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use bytes::Bytes;
use mapas_client::{Backend, UploadEvents};
use mapas_core::{
    BackendErrorKind, Category, CategoryId, CoordinateUpdate, MapId, MapRecord, NewMap,
};
use mapas_metadata::{CategoryRepo, MapRepo, MetadataError, MetadataResult, MetadataStore};
use mapas_storage::{
    BucketInfo, ObjectInfo, ObjectStore, StorageError, StorageResult, UploadOptions,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

pub const PUBLIC_BASE: &str = "http://files.test/mapas";

struct Failure {
    needle: String,
    remaining: usize,
    kind: BackendErrorKind,
}

/// In-memory bucket with injectable upload failures and delays.
///
/// Runs entirely on the tokio timer, so it is safe under paused time.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Bytes>>,
    failures: Mutex<Vec<Failure>>,
    delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl MemoryStorage {
    /// Fail the next `times` uploads whose key contains `needle`.
    pub fn fail_uploads(&self, needle: &str, times: usize, kind: BackendErrorKind) {
        self.failures.lock().unwrap().push(Failure {
            needle: needle.to_string(),
            remaining: times,
            kind,
        });
    }

    /// Sleep this long before every upload completes.
    pub fn delay_uploads(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn upload_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    fn injected_failure(&self, key: &str) -> Option<StorageError> {
        let mut failures = self.failures.lock().unwrap();
        let failure = failures
            .iter_mut()
            .find(|f| f.remaining > 0 && key.contains(&f.needle))?;
        failure.remaining -= 1;
        Some(StorageError::Backend {
            status: 503,
            kind: failure.kind,
            message: format!("injected failure for {key}"),
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn upload(&self, key: &str, data: Bytes, options: &UploadOptions) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.injected_failure(key) {
            return Err(err);
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) && !options.upsert {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), data);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{PUBLIC_BASE}/{key}")
    }

    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(name, data)| ObjectInfo {
                name: name.clone(),
                size: Some(data.len() as u64),
            })
            .collect())
    }

    async fn bucket(&self) -> StorageResult<Option<BucketInfo>> {
        Ok(Some(BucketInfo {
            name: "mapas".to_string(),
            public: true,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
struct Tables {
    categories: Vec<Category>,
    /// Newest first.
    maps: Vec<MapRecord>,
}

/// In-memory tables with an injectable insert delay.
///
/// A delayed insert stores its row before sleeping, like a request that
/// reached the database but whose response never came back.
#[derive(Default)]
pub struct MemoryMetadata {
    tables: Mutex<Tables>,
    insert_delay: Mutex<Option<Duration>>,
    writes: AtomicUsize,
}

impl MemoryMetadata {
    pub fn delay_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    /// Number of mutating calls received.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn map_count(&self) -> usize {
        self.tables.lock().unwrap().maps.len()
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn conflict(message: String) -> MetadataError {
    MetadataError::Backend {
        status: 409,
        code: Some("23503".to_string()),
        kind: BackendErrorKind::Conflict,
        message,
    }
}

#[async_trait]
impl CategoryRepo for MemoryMetadata {
    async fn list_categories(&self) -> MetadataResult<Vec<Category>> {
        let mut categories = self.tables.lock().unwrap().categories.clone();
        categories.sort_by_key(|c| c.name.to_lowercase());
        Ok(categories)
    }

    async fn get_category(&self, id: CategoryId) -> MetadataResult<Option<Category>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, name: &str) -> MetadataResult<Category> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        if tables
            .categories
            .iter()
            .any(|c| c.name.to_lowercase() == name.to_lowercase())
        {
            return Err(MetadataError::AlreadyExists(format!("category '{name}'")));
        }
        let category = Category {
            id: CategoryId::new(),
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn rename_category(&self, id: CategoryId, name: &str) -> MetadataResult<()> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        let category = tables
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| MetadataError::NotFound(format!("category {id}")))?;
        category.name = name.to_string();
        Ok(())
    }

    async fn delete_category(&self, id: CategoryId) -> MetadataResult<()> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        if tables.maps.iter().any(|m| m.category_id == Some(id)) {
            return Err(conflict(format!("category {id} is still referenced")));
        }
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        if tables.categories.len() == before {
            return Err(MetadataError::NotFound(format!("category {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MapRepo for MemoryMetadata {
    async fn list_maps(&self) -> MetadataResult<Vec<MapRecord>> {
        Ok(self.tables.lock().unwrap().maps.clone())
    }

    async fn get_map(&self, id: MapId) -> MetadataResult<Option<MapRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.maps.iter().find(|m| m.id == id).cloned())
    }

    async fn find_map_by_file_url(&self, file_url: &str) -> MetadataResult<Option<MapRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.maps.iter().find(|m| m.file_url == file_url).cloned())
    }

    async fn insert_map(&self, map: &NewMap) -> MetadataResult<MapRecord> {
        self.write();
        let record = {
            let mut tables = self.tables.lock().unwrap();
            if let Some(category) = map.category_id
                && !tables.categories.iter().any(|c| c.id == category)
            {
                return Err(conflict(format!("unknown category {category}")));
            }
            let record = MapRecord {
                id: MapId::new(),
                name: map.name.clone(),
                farm: map.farm.clone(),
                category_id: map.category_id,
                file_url: map.file_url.clone(),
                annotations: serde_json::json!({}),
                latitude: None,
                longitude: None,
                created_at: OffsetDateTime::now_utc(),
            };
            tables.maps.insert(0, record.clone());
            record
        };
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(record)
    }

    async fn update_coordinates(&self, id: MapId, update: CoordinateUpdate) -> MetadataResult<()> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        let map = tables
            .maps
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MetadataError::NotFound(format!("map {id}")))?;
        map.latitude = update.latitude;
        map.longitude = update.longitude;
        Ok(())
    }

    async fn update_annotations(&self, id: MapId, annotations: &serde_json::Value) -> MetadataResult<()> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        let map = tables
            .maps
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MetadataError::NotFound(format!("map {id}")))?;
        map.annotations = annotations.clone();
        Ok(())
    }

    async fn set_category(&self, ids: &[MapId], category: CategoryId) -> MetadataResult<u64> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for map in tables.maps.iter_mut().filter(|m| ids.contains(&m.id)) {
            map.category_id = Some(category);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_map(&self, id: MapId) -> MetadataResult<()> {
        self.write();
        let mut tables = self.tables.lock().unwrap();
        let before = tables.maps.len();
        tables.maps.retain(|m| m.id != id);
        if tables.maps.len() == before {
            return Err(MetadataError::NotFound(format!("map {id}")));
        }
        Ok(())
    }

    async fn category_references(&self) -> MetadataResult<Vec<Option<CategoryId>>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.maps.iter().map(|m| m.category_id).collect())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Backend over the in-memory fakes, with handles to inspect them.
pub struct MemoryBackend {
    pub backend: Backend,
    pub storage: Arc<MemoryStorage>,
    pub metadata: Arc<MemoryMetadata>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStorage::default());
        let metadata = Arc::new(MemoryMetadata::default());
        let backend = Backend::new(storage.clone(), metadata.clone());
        Self {
            backend,
            storage,
            metadata,
        }
    }
}

/// Event observed during a batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    BatchStarted { index: usize, batches: usize, files: usize },
    Progress(u8),
    Completed(usize),
    Failed(usize),
}

/// Records every event of a batch run.
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<Event>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl UploadEvents for RecordingEvents {
    fn batch_started(&self, index: usize, batches: usize, files: usize) {
        self.push(Event::BatchStarted {
            index,
            batches,
            files,
        });
    }

    fn progress(&self, percent: u8) {
        self.push(Event::Progress(percent));
    }

    fn uploads_completed(&self, succeeded: usize) {
        self.push(Event::Completed(succeeded));
    }

    fn uploads_failed(&self, failed: usize) {
        self.push(Event::Failed(failed));
    }
}
