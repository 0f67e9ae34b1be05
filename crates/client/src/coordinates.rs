//! GPS coordinates of a map.

use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use mapas_core::{CoordinateUpdate, Coordinates, GeolocationError, MapId, MapRecord};
use mapas_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Device capability reporting the current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Provider answering with a fixed position, such as one given on the
/// command line.
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Deep links for a located map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapLinks {
    /// `lat, lng` with six decimals.
    pub display: String,
    pub google_maps: String,
    pub google_earth: String,
}

impl From<Coordinates> for MapLinks {
    fn from(coords: Coordinates) -> Self {
        Self {
            display: coords.to_string(),
            google_maps: coords.google_maps_link(),
            google_earth: coords.google_earth_link(),
        }
    }
}

/// Reads and writes the coordinates of map rows.
pub struct CoordinateEditor {
    metadata: Arc<dyn MetadataStore>,
}

impl CoordinateEditor {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Parse the two text fields and store them in one update.
    ///
    /// Blank fields clear the value. Invalid or out-of-range input is
    /// rejected before the backend is contacted.
    #[instrument(skip(self))]
    pub async fn save(
        &self,
        id: MapId,
        latitude: &str,
        longitude: &str,
    ) -> ServiceResult<CoordinateUpdate> {
        let update = CoordinateUpdate::parse(latitude, longitude)?;
        self.store(id, update).await?;
        info!(map = %id, "coordinates saved");
        Ok(update)
    }

    /// Clear both fields.
    #[instrument(skip(self))]
    pub async fn clear(&self, id: MapId) -> ServiceResult<()> {
        self.store(id, CoordinateUpdate::cleared()).await?;
        info!(map = %id, "coordinates cleared");
        Ok(())
    }

    /// Ask the device for its position. Nothing is stored.
    pub async fn fill_from_device(
        &self,
        provider: Option<&dyn LocationProvider>,
    ) -> ServiceResult<Coordinates> {
        let provider = provider.ok_or(ServiceError::Geolocation(GeolocationError::Unsupported))?;
        let coords = provider
            .current_position()
            .await
            .map_err(ServiceError::Geolocation)?;
        // A misbehaving provider must not bypass the range rules.
        Ok(Coordinates::new(coords.latitude, coords.longitude)?)
    }

    /// Links for a map, when both coordinates are set.
    pub fn links(map: &MapRecord) -> Option<MapLinks> {
        map.coordinates().map(MapLinks::from)
    }

    async fn store(&self, id: MapId, update: CoordinateUpdate) -> ServiceResult<()> {
        self.metadata
            .update_coordinates(id, update)
            .await
            .map_err(|e| match e {
                MetadataError::NotFound(_) => ServiceError::NotFound(format!("map {id}")),
                other => other.into(),
            })
    }
}
