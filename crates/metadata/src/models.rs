//! Database rows of the local SQLite schema.

use crate::error::{MetadataError, MetadataResult};
use mapas_core::{Category, CategoryId, MapId, MapRecord};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Category row.
#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub nome: String,
    pub criado_em: OffsetDateTime,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            name: row.nome,
            created_at: row.criado_em,
        }
    }
}

/// Map row. `anotacoes` holds JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct MapRow {
    pub id: Uuid,
    pub nome: String,
    pub fazenda: String,
    pub categoria_id: Option<Uuid>,
    pub arquivo_url: String,
    pub anotacoes: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub criado_em: OffsetDateTime,
}

impl TryFrom<MapRow> for MapRecord {
    type Error = MetadataError;

    fn try_from(row: MapRow) -> MetadataResult<Self> {
        let annotations = serde_json::from_str(&row.anotacoes).map_err(|e| {
            MetadataError::Decode(format!("map {} has invalid annotations: {e}", row.id))
        })?;
        Ok(MapRecord {
            id: MapId::from_uuid(row.id),
            name: row.nome,
            farm: row.fazenda,
            category_id: row.categoria_id.map(CategoryId::from_uuid),
            file_url: row.arquivo_url,
            annotations,
            latitude: row.latitude,
            longitude: row.longitude,
            created_at: row.criado_em,
        })
    }
}
