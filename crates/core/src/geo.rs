//! GPS coordinates attached to maps.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// A validated latitude/longitude pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build a pair, rejecting values outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        Ok(Self {
            latitude: check_latitude(latitude)?,
            longitude: check_longitude(longitude)?,
        })
    }

    /// Link opening the position in Google Maps.
    pub fn google_maps_link(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// Link opening the position in Google Earth web.
    pub fn google_earth_link(&self) -> String {
        format!(
            "https://earth.google.com/web/@{},{},1000a,1000d,35y,0h,0t,0r",
            self.latitude, self.longitude
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// New coordinate values for a map, either of which may be cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CoordinateUpdate {
    /// Update that clears both fields.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Parse the two text fields of the coordinate editor.
    ///
    /// Blank input means "no value". Anything else must be a finite number
    /// inside the valid range for its axis.
    pub fn parse(latitude: &str, longitude: &str) -> crate::Result<Self> {
        let latitude = parse_field(latitude)?.map(check_latitude).transpose()?;
        let longitude = parse_field(longitude)?.map(check_longitude).transpose()?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Whether both fields are cleared.
    pub fn is_cleared(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none()
    }

    /// The pair, when both values are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

impl From<Coordinates> for CoordinateUpdate {
    fn from(value: Coordinates) -> Self {
        Self {
            latitude: Some(value.latitude),
            longitude: Some(value.longitude),
        }
    }
}

fn parse_field(input: &str) -> crate::Result<Option<f64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| crate::Error::InvalidCoordinates(format!("not a number: {trimmed:?}")))?;
    if !value.is_finite() {
        return Err(crate::Error::InvalidCoordinates(format!(
            "not a finite number: {trimmed:?}"
        )));
    }
    Ok(Some(value))
}

fn check_latitude(value: f64) -> crate::Result<f64> {
    if (MIN_LATITUDE..=MAX_LATITUDE).contains(&value) {
        Ok(value)
    } else {
        Err(crate::Error::LatitudeOutOfRange(value))
    }
}

fn check_longitude(value: f64) -> crate::Result<f64> {
    if (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&value) {
        Ok(value)
    } else {
        Err(crate::Error::LongitudeOutOfRange(value))
    }
}

/// Failure codes of the device geolocation capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out while acquiring position")]
    Timeout,
    #[error("geolocation is not supported on this device")]
    Unsupported,
}

impl GeolocationError {
    /// Notice shown to the operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permissão de localização negada",
            Self::PositionUnavailable => "Localização indisponível",
            Self::Timeout => "Tempo limite excedido",
            Self::Unsupported => "Geolocalização não suportada neste dispositivo",
        }
    }
}
