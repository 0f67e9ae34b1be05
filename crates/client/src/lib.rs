//! Services of the farm map catalog.
//!
//! This crate provides:
//! - The upload queue and the batched, retrying uploader
//! - Category management under the naming and deletion rules
//! - Coordinate editing and map deep links
//! - Catalog browsing, bulk re-categorisation and annotation saving
//! - Backend diagnostics with setup scripts

pub mod batch;
pub mod catalog;
pub mod categories;
pub mod coordinates;
pub mod diagnostics;
pub mod error;
pub mod queue;
pub mod uploader;

pub use batch::{BatchReport, BatchUploader, NoEvents, UploadEvents};
pub use catalog::{MapCatalog, MapFilter};
pub use categories::{CategoryManager, CategoryUsage};
pub use coordinates::{CoordinateEditor, FixedLocation, LocationProvider, MapLinks};
pub use diagnostics::{CheckResult, CheckStatus, Diagnostics, Remediation};
pub use error::{ServiceError, ServiceResult, UploadError};
pub use queue::{EntryId, QueueAction, QueueEntry, QueueHandle, UploadQueue};
pub use uploader::{FileUploader, UploadSettings};

use mapas_core::config::AppConfig;
use mapas_metadata::MetadataStore;
use mapas_storage::ObjectStore;
use std::sync::Arc;

/// The two backend seams every service works against.
#[derive(Clone)]
pub struct Backend {
    pub storage: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Backend {
    pub fn new(storage: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { storage, metadata }
    }

    /// Connect both backends selected by `config`.
    pub async fn connect(config: &AppConfig) -> ServiceResult<Self> {
        let storage = mapas_storage::from_config(&config.backend, &config.storage).await?;
        let metadata = mapas_metadata::from_config(&config.backend, &config.metadata).await?;
        tracing::debug!(
            storage = storage.backend_name(),
            metadata = metadata.backend_name(),
            "backends connected"
        );
        Ok(Self { storage, metadata })
    }
}
