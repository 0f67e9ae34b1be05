//! Hosted object storage reached over its REST API.
//!
//! Routes (relative to the project URL):
//! - `POST   /storage/v1/object/{bucket}/{key}` upload
//! - `DELETE /storage/v1/object/{bucket}` remove (`{"prefixes": [...]}`)
//! - `POST   /storage/v1/object/list/{bucket}` list
//! - `GET    /storage/v1/bucket` list buckets
//! - `/storage/v1/object/public/{bucket}/{key}` public reads

use crate::error::{StorageError, StorageResult};
use crate::traits::{BucketInfo, ObjectInfo, ObjectStore, UploadOptions};
use async_trait::async_trait;
use bytes::Bytes;
use mapas_core::BackendErrorKind;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Page size of bucket listings.
const LIST_LIMIT: u32 = 100;

/// Hosted storage client bound to one bucket.
pub struct HostedStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HostedStorage {
    /// Create a client for `bucket` at the project `base_url`.
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> StorageResult<Self> {
        if bucket.trim().is_empty() {
            return Err(StorageError::Config("bucket name must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .default_headers(auth_headers(anon_key)?)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{key}", self.base_url, self.bucket)
    }

    async fn check(&self, response: reqwest::Response) -> StorageResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.error_from_body(status.as_u16(), &body))
    }

    /// Map a storage error body (`{"statusCode","error","message"}`) to a
    /// typed error. The body status wins over the HTTP status when present.
    fn error_from_body(&self, http_status: u16, body: &str) -> StorageError {
        let parsed: Option<StorageErrorBody> = serde_json::from_str(body).ok();
        let (status, error, message) = match parsed {
            Some(b) => (
                b.status_code.and_then(|s| s.as_u16()).unwrap_or(http_status),
                b.error.unwrap_or_default(),
                b.message.unwrap_or_else(|| body.to_string()),
            ),
            None => (http_status, String::new(), body.to_string()),
        };

        let text = format!("{error} {message}");
        let kind = BackendErrorKind::classify(status, None, &text);
        match kind {
            BackendErrorKind::MissingBucket => StorageError::BucketNotFound(self.bucket.clone()),
            BackendErrorKind::Conflict => StorageError::AlreadyExists(message),
            _ => StorageError::Backend {
                status,
                kind,
                message: if message.is_empty() { error } else { message },
            },
        }
    }
}

fn auth_headers(anon_key: &str) -> StorageResult<HeaderMap> {
    let invalid = |_| StorageError::Config("API key contains invalid header characters".into());
    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(anon_key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {anon_key}")).map_err(invalid)?,
    );
    Ok(headers)
}

#[derive(Deserialize)]
struct StorageErrorBody {
    #[serde(rename = "statusCode")]
    status_code: Option<StatusCode>,
    error: Option<String>,
    message: Option<String>,
}

/// The storage API sends `statusCode` as a string or a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusCode {
    Number(u16),
    Text(String),
}

impl StatusCode {
    fn as_u16(&self) -> Option<u16> {
        match self {
            StatusCode::Number(n) => Some(*n),
            StatusCode::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    metadata: Option<ListedMetadata>,
}

#[derive(Deserialize)]
struct ListedMetadata {
    size: Option<u64>,
}

#[async_trait]
impl ObjectStore for HostedStorage {
    #[instrument(skip(self, data, options), fields(backend = "hosted", size = data.len()))]
    async fn upload(&self, key: &str, data: Bytes, options: &UploadOptions) -> StorageResult<()> {
        let response = self
            .http
            .post(self.object_url(key))
            .header(CONTENT_TYPE, &options.content_type)
            .header(
                CACHE_CONTROL,
                format!("max-age={}", options.cache_control_secs),
            )
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(data)
            .send()
            .await?;
        self.check(response).await?;
        debug!(key, bucket = %self.bucket, "object uploaded");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{key}",
            self.base_url, self.bucket
        )
    }

    #[instrument(skip(self), fields(backend = "hosted", count = keys.len()))]
    async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .http
            .delete(url)
            .json(&json!({ "prefixes": keys }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn list(&self) -> StorageResult<Vec<ObjectInfo>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let mut objects = Vec::new();
        let mut offset = 0u32;
        loop {
            let response = self
                .http
                .post(&url)
                .json(&json!({
                    "prefix": "",
                    "limit": LIST_LIMIT,
                    "offset": offset,
                    "sortBy": { "column": "name", "order": "asc" },
                }))
                .send()
                .await?;
            let page: Vec<ListedObject> = self.check(response).await?.json().await?;
            let page_len = page.len() as u32;
            objects.extend(page.into_iter().map(|o| ObjectInfo {
                name: o.name,
                size: o.metadata.and_then(|m| m.size),
            }));
            if page_len < LIST_LIMIT {
                break;
            }
            offset += page_len;
        }
        Ok(objects)
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn bucket(&self) -> StorageResult<Option<BucketInfo>> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let response = self.http.get(url).send().await?;
        let buckets: Vec<BucketInfo> = self.check(response).await?.json().await?;
        Ok(buckets.into_iter().find(|b| b.name == self.bucket))
    }

    fn backend_name(&self) -> &'static str {
        "hosted"
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn health_check(&self) -> StorageResult<()> {
        match self.bucket().await? {
            Some(_) => Ok(()),
            None => Err(StorageError::BucketNotFound(self.bucket.clone())),
        }
    }
}
