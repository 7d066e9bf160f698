use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A stored address. Coordinates are optional; distance defaults apply when
/// either one is missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: Uuid,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Location {
    pub fn new(address: impl Into<String>, lat: Option<f64>, lng: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            lat,
            lng,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}
