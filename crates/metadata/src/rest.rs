//! Hosted tables reached over the REST gateway (PostgREST conventions).
//!
//! Filters are query parameters (`id=eq.{id}`, `id=in.(a,b)`), ordering is
//! `order=column.asc|desc`, and mutations ask for the affected rows with
//! `Prefer: return=representation`.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{CategoryRepo, MapRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use mapas_core::{
    BackendErrorKind, CATEGORIES_TABLE, Category, CategoryId, CoordinateUpdate, MAPS_TABLE, MapId,
    MapRecord, NewMap,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const RETURN_REPRESENTATION: &str = "return=representation";

/// Metadata store backed by the hosted tables.
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
}

/// Error body returned by the gateway.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

#[derive(Deserialize)]
struct CategoryRef {
    categoria_id: Option<CategoryId>,
}

impl RestStore {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: &str) -> MetadataResult<Self> {
        let invalid = |_| MetadataError::Config("API key contains invalid header characters".into());
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(anon_key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {anon_key}")).map_err(invalid)?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> MetadataResult<T> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| MetadataError::Decode(format!("unexpected response body: {e}")))
    }

    /// Select rows of `table` matching `filters`.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> MetadataResult<Vec<T>> {
        let req = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(filters);
        self.send_json(req).await
    }

    /// PATCH rows matching `filters`; returns the updated rows.
    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: serde_json::Value,
    ) -> MetadataResult<Vec<T>> {
        let req = self
            .http
            .patch(self.table_url(table))
            .query(filters)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        self.send_json(req).await
    }

    /// DELETE rows matching `filters`; returns the deleted rows.
    async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> MetadataResult<Vec<T>> {
        let req = self
            .http
            .delete(self.table_url(table))
            .query(filters)
            .header("Prefer", RETURN_REPRESENTATION);
        self.send_json(req).await
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: serde_json::Value,
    ) -> MetadataResult<T> {
        let req = self
            .http
            .post(self.table_url(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        let mut rows: Vec<T> = self.send_json(req).await?;
        if rows.is_empty() {
            return Err(MetadataError::Decode(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    /// Probe a table with a one-row select.
    async fn probe(&self, table: &str) -> MetadataResult<()> {
        let req = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "id"), ("limit", "1")]);
        let _: Vec<serde_json::Value> = self.send_json(req).await?;
        Ok(())
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Map a gateway error body to a typed error.
fn error_from_body(status: u16, body: &str) -> MetadataError {
    match serde_json::from_str::<RestErrorBody>(body) {
        Ok(err) => {
            let mut message = err.message.unwrap_or_default();
            for extra in [err.details, err.hint].into_iter().flatten() {
                if !extra.is_empty() {
                    message.push_str(" (");
                    message.push_str(&extra);
                    message.push(')');
                }
            }
            let kind = BackendErrorKind::classify(status, err.code.as_deref(), &message);
            MetadataError::Backend {
                status,
                code: err.code,
                kind,
                message,
            }
        }
        Err(_) => MetadataError::Backend {
            status,
            code: None,
            kind: BackendErrorKind::classify(status, None, body),
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl CategoryRepo for RestStore {
    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn list_categories(&self) -> MetadataResult<Vec<Category>> {
        self.select(CATEGORIES_TABLE, &[("order", "nome.asc".to_string())])
            .await
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn get_category(&self, id: CategoryId) -> MetadataResult<Option<Category>> {
        let rows: Vec<Category> = self.select(CATEGORIES_TABLE, &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn insert_category(&self, name: &str) -> MetadataResult<Category> {
        self.insert(CATEGORIES_TABLE, json!({ "nome": name }))
            .await
            .map_err(|e| match e.kind() {
                BackendErrorKind::Conflict => {
                    MetadataError::AlreadyExists(format!("category '{name}'"))
                }
                _ => e,
            })
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn rename_category(&self, id: CategoryId, name: &str) -> MetadataResult<()> {
        let rows: Vec<Category> = self
            .update(CATEGORIES_TABLE, &[("id", eq(id))], json!({ "nome": name }))
            .await?;
        if rows.is_empty() {
            return Err(MetadataError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn delete_category(&self, id: CategoryId) -> MetadataResult<()> {
        let rows: Vec<Category> = self.delete(CATEGORIES_TABLE, &[("id", eq(id))]).await?;
        if rows.is_empty() {
            return Err(MetadataError::NotFound(format!("category {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MapRepo for RestStore {
    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn list_maps(&self) -> MetadataResult<Vec<MapRecord>> {
        self.select(MAPS_TABLE, &[("order", "criado_em.desc".to_string())])
            .await
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn get_map(&self, id: MapId) -> MetadataResult<Option<MapRecord>> {
        let rows: Vec<MapRecord> = self.select(MAPS_TABLE, &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn find_map_by_file_url(&self, file_url: &str) -> MetadataResult<Option<MapRecord>> {
        let rows: Vec<MapRecord> = self
            .select(
                MAPS_TABLE,
                &[("arquivo_url", eq(file_url)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, map), fields(backend = "hosted", file_url = %map.file_url))]
    async fn insert_map(&self, map: &NewMap) -> MetadataResult<MapRecord> {
        let body = serde_json::to_value(map)
            .map_err(|e| MetadataError::Decode(format!("cannot encode map: {e}")))?;
        let record: MapRecord = self.insert(MAPS_TABLE, body).await?;
        debug!(id = %record.id, "map row inserted");
        Ok(record)
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn update_coordinates(&self, id: MapId, update: CoordinateUpdate) -> MetadataResult<()> {
        let rows: Vec<MapRecord> = self
            .update(
                MAPS_TABLE,
                &[("id", eq(id))],
                json!({ "latitude": update.latitude, "longitude": update.longitude }),
            )
            .await?;
        if rows.is_empty() {
            return Err(MetadataError::NotFound(format!("map {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, annotations), fields(backend = "hosted"))]
    async fn update_annotations(
        &self,
        id: MapId,
        annotations: &serde_json::Value,
    ) -> MetadataResult<()> {
        let rows: Vec<MapRecord> = self
            .update(
                MAPS_TABLE,
                &[("id", eq(id))],
                json!({ "anotacoes": annotations }),
            )
            .await?;
        if rows.is_empty() {
            return Err(MetadataError::NotFound(format!("map {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, ids), fields(backend = "hosted", count = ids.len()))]
    async fn set_category(&self, ids: &[MapId], category: CategoryId) -> MetadataResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let rows: Vec<MapRecord> = self
            .update(
                MAPS_TABLE,
                &[("id", format!("in.({list})"))],
                json!({ "categoria_id": category }),
            )
            .await?;
        Ok(rows.len() as u64)
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn delete_map(&self, id: MapId) -> MetadataResult<()> {
        let rows: Vec<MapRecord> = self.delete(MAPS_TABLE, &[("id", eq(id))]).await?;
        if rows.is_empty() {
            return Err(MetadataError::NotFound(format!("map {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn category_references(&self) -> MetadataResult<Vec<Option<CategoryId>>> {
        let req = self
            .http
            .get(self.table_url(MAPS_TABLE))
            .query(&[("select", "categoria_id")]);
        let rows: Vec<CategoryRef> = self.send_json(req).await?;
        Ok(rows.into_iter().map(|r| r.categoria_id).collect())
    }
}

#[async_trait]
impl MetadataStore for RestStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Hosted tables are created by the setup scripts, not by the client.
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "hosted"))]
    async fn health_check(&self) -> MetadataResult<()> {
        self.probe(CATEGORIES_TABLE).await?;
        self.probe(MAPS_TABLE).await
    }

    fn backend_name(&self) -> &'static str {
        "hosted"
    }
}
