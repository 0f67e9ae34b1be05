//! Map records and annotation snapshots.

use crate::category::CategoryId;
use crate::geo::Coordinates;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(Uuid);

impl MapId {
    /// Generate a new random map ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid map ID {s:?}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MapId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapId({})", self.0)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored PDF map with its metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "fazenda")]
    pub farm: String,
    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<CategoryId>,
    #[serde(rename = "arquivo_url")]
    pub file_url: String,
    /// Opaque annotation blob, usually an [`Annotation`] snapshot.
    #[serde(rename = "anotacoes", default)]
    pub annotations: serde_json::Value,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "criado_em", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MapRecord {
    /// Coordinates, when both values are set.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Storage key of the backing file (last path segment of the URL).
    pub fn object_key(&self) -> Option<&str> {
        object_key_from_url(&self.file_url)
    }

    /// Whether an annotation snapshot has been saved.
    pub fn has_annotations(&self) -> bool {
        match &self.annotations {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Case-insensitive substring match on name or farm.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.farm.to_lowercase().contains(&query)
    }
}

/// Metadata row written after a successful upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMap {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "fazenda")]
    pub farm: String,
    #[serde(rename = "arquivo_url")]
    pub file_url: String,
    #[serde(rename = "categoria_id")]
    pub category_id: Option<CategoryId>,
}

/// Extract the object key from a public file URL.
pub fn object_key_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

/// Raster snapshot of freehand markup drawn over a map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// PNG encoded as a `data:` URL.
    #[serde(rename = "imageData")]
    pub image_data: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Annotation {
    /// PNG data URL prefix.
    pub const PNG_DATA_URL_PREFIX: &'static str = "data:image/png;base64,";

    /// Wrap a PNG data URL taken at `timestamp`.
    pub fn new(image_data: String, timestamp: OffsetDateTime) -> crate::Result<Self> {
        if !image_data.starts_with(Self::PNG_DATA_URL_PREFIX) {
            return Err(crate::Error::InvalidAnnotation(
                "expected a PNG data URL".to_string(),
            ));
        }
        Ok(Self {
            image_data,
            timestamp,
        })
    }

    /// Serialize to the JSON blob stored on the map row.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "imageData": self.image_data,
            "timestamp": self
                .timestamp
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapRecord {
        MapRecord {
            id: MapId::new(),
            name: "Talhão 12".to_string(),
            farm: "Santa Rita".to_string(),
            category_id: None,
            file_url: "https://x.supabase.co/storage/v1/object/public/mapas/1720000000000_talhao_12.pdf"
                .to_string(),
            annotations: serde_json::json!({}),
            latitude: Some(-22.5),
            longitude: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_object_key_from_url() {
        assert_eq!(
            sample().object_key(),
            Some("1720000000000_talhao_12.pdf")
        );
        assert_eq!(
            object_key_from_url("http://host/files/a.pdf?download=1"),
            Some("a.pdf")
        );
        assert_eq!(object_key_from_url("http://host/files/"), None);
    }

    #[test]
    fn test_coordinates_require_both() {
        let mut map = sample();
        assert!(map.coordinates().is_none());
        map.longitude = Some(-47.0);
        assert_eq!(map.coordinates().unwrap().longitude, -47.0);
    }

    #[test]
    fn test_search_matches_name_or_farm() {
        let map = sample();
        assert!(map.matches_search("TALHÃO"));
        assert!(map.matches_search("rita"));
        assert!(map.matches_search(""));
        assert!(!map.matches_search("colheita"));
    }

    #[test]
    fn test_has_annotations() {
        let mut map = sample();
        assert!(!map.has_annotations());
        map.annotations = serde_json::Value::Null;
        assert!(!map.has_annotations());
        map.annotations = serde_json::json!({"imageData": "data:image/png;base64,AA=="});
        assert!(map.has_annotations());
    }

    #[test]
    fn test_annotation_value_shape() {
        let ts = time::macros::datetime!(2025-07-05 12:00:00 UTC);
        let annotation =
            Annotation::new("data:image/png;base64,iVBORw0KGgo=".to_string(), ts).unwrap();
        let value = annotation.to_value();
        assert_eq!(value["imageData"], "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(value["timestamp"], "2025-07-05T12:00:00Z");

        assert!(Annotation::new("not a data url".to_string(), ts).is_err());
    }

    #[test]
    fn test_map_record_accepts_null_columns() {
        let json = r#"{
            "id": "0b7c6c4a-1c7e-4a35-a0a5-8f0d6c7e9a10",
            "nome": "Mapa",
            "fazenda": "Boa Vista",
            "categoria_id": null,
            "arquivo_url": "https://host/mapas/a.pdf",
            "anotacoes": null,
            "latitude": null,
            "longitude": null,
            "criado_em": "2025-07-05T18:31:47.5+00:00"
        }"#;
        let map: MapRecord = serde_json::from_str(json).unwrap();
        assert!(map.category_id.is_none());
        assert!(!map.has_annotations());
    }
}
