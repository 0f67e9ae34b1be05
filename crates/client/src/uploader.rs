//! Upload of a single queued file.

use crate::Backend;
use crate::error::UploadError;
use crate::queue::{QueueAction, QueueEntry, QueueHandle};
use mapas_core::config::UploadConfig;
use mapas_core::{CategoryId, MapRecord, NewMap, unique_object_key};
use mapas_storage::UploadOptions;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Retry and timeout policy of the uploader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub storage_timeout: Duration,
    pub metadata_timeout: Duration,
    pub cache_control_secs: u64,
}

impl From<&UploadConfig> for UploadSettings {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            storage_timeout: config.storage_timeout(),
            metadata_timeout: config.metadata_timeout(),
            cache_control_secs: config.cache_control_secs,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Stores one file and records its map row, with bounded retries.
pub struct FileUploader {
    backend: Backend,
    settings: UploadSettings,
    last_timestamp_ms: AtomicI64,
}

impl FileUploader {
    pub fn new(backend: Backend, settings: UploadSettings) -> Self {
        Self {
            backend,
            settings,
            last_timestamp_ms: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Upload `entry` into `category`, recording progress in `queue`.
    ///
    /// Attempts run until one succeeds, a non-retryable error occurs or
    /// `max_attempts` is reached. Cancellation drops the in-flight attempt
    /// and puts the entry back to pending.
    #[instrument(skip_all, fields(entry = %entry.id, file = %entry.file_name))]
    pub async fn upload(
        &self,
        queue: &QueueHandle,
        entry: &QueueEntry,
        category: CategoryId,
        cancel: &CancellationToken,
    ) -> Result<MapRecord, UploadError> {
        let id = entry.id;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !queue.apply(QueueAction::Started { id, attempt }) {
                debug!(attempt, "entry no longer queued, skipping");
                return Err(UploadError::Withdrawn);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(UploadError::Cancelled),
                result = self.attempt(entry, category, attempt) => result,
            };

            let err = match result {
                Ok(map) => {
                    info!(map = %map.id, attempt, "upload complete");
                    queue.apply(QueueAction::Succeeded { id, map_id: map.id });
                    return Ok(map);
                }
                Err(UploadError::Cancelled) => {
                    queue.apply(QueueAction::Interrupted { id });
                    return Err(UploadError::Cancelled);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.settings.max_attempts {
                warn!(attempt, kind = %err.kind(), error = %err, "upload failed");
                queue.apply(QueueAction::Failed {
                    id,
                    error: err.to_string(),
                });
                return Err(err);
            }

            warn!(
                attempt,
                kind = %err.kind(),
                error = %err,
                "upload attempt failed, retrying in {}ms",
                self.settings.retry_delay.as_millis()
            );
            queue.apply(QueueAction::AttemptFailed {
                id,
                error: err.to_string(),
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    queue.apply(QueueAction::Interrupted { id });
                    return Err(UploadError::Cancelled);
                }
                _ = sleep(self.settings.retry_delay) => {}
            }
        }
    }

    /// One attempt: store the bytes, then insert the row.
    async fn attempt(
        &self,
        entry: &QueueEntry,
        category: CategoryId,
        attempt: u32,
    ) -> Result<MapRecord, UploadError> {
        let key = unique_object_key(i128::from(self.next_timestamp_ms()), &entry.file_name);
        let options = UploadOptions::pdf().with_cache_control(self.settings.cache_control_secs);
        debug!(%key, attempt, size = entry.size(), "uploading object");

        let stored = timeout(
            self.settings.storage_timeout,
            self.backend.storage.upload(&key, entry.data.clone(), &options),
        )
        .await;
        match stored {
            Ok(result) => result?,
            Err(_) => {
                // The request may still have landed before it was dropped.
                self.discard_object(&key).await;
                return Err(UploadError::StorageTimeout(self.settings.storage_timeout));
            }
        }

        let file_url = self.backend.storage.public_url(&key);
        let map = NewMap {
            name: entry.name.clone(),
            farm: entry.farm.clone(),
            file_url: file_url.clone(),
            category_id: Some(category),
        };

        let inserted = timeout(
            self.settings.metadata_timeout,
            self.backend.metadata.insert_map(&map),
        )
        .await;
        match inserted {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(err)) => {
                self.discard_object(&key).await;
                Err(err.into())
            }
            Err(_) => {
                if let Some(record) = self.find_landed_row(&file_url).await {
                    info!(%key, map = %record.id, "insert landed after its deadline");
                    return Ok(record);
                }
                self.discard_object(&key).await;
                Err(UploadError::MetadataTimeout(self.settings.metadata_timeout))
            }
        }
    }

    /// Row written by an insert whose response never arrived.
    async fn find_landed_row(&self, file_url: &str) -> Option<MapRecord> {
        let lookup = timeout(
            self.settings.metadata_timeout,
            self.backend.metadata.find_map_by_file_url(file_url),
        )
        .await;
        match lookup {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(error = %err, "lookup after insert timeout failed");
                None
            }
            Err(_) => None,
        }
    }

    /// Best-effort removal of an object that has no row.
    async fn discard_object(&self, key: &str) {
        let keys = [key.to_string()];
        match timeout(self.settings.storage_timeout, self.backend.storage.remove(&keys)).await {
            Ok(Ok(())) => debug!(%key, "removed orphaned object"),
            Ok(Err(err)) => warn!(%key, error = %err, "failed to remove orphaned object"),
            Err(_) => warn!(%key, "timed out removing orphaned object"),
        }
    }

    /// Millisecond timestamp for object keys, strictly increasing per uploader.
    fn next_timestamp_ms(&self) -> i64 {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let previous = self
            .last_timestamp_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}
