use crate::error::DeliveryError;
use crate::models::delivery::DeliveryType;
use crate::models::location::{GeoPoint, Location};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Straight-line distance strategy. Swappable so a routing-backed estimate
/// can replace the great-circle one without touching the engine.
pub trait DistanceEstimator: Send + Sync {
    fn distance_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceEstimator for Haversine {
    fn distance_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        haversine_km(a, b)
    }
}

/// Average speed and duration ceiling for one delivery variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelProfile {
    pub avg_speed_kmh: f64,
    pub max_minutes: u32,
}

impl TravelProfile {
    pub fn for_variant(variant: DeliveryType) -> Self {
        match variant {
            DeliveryType::Standard => Self {
                avg_speed_kmh: 30.0,
                max_minutes: 240,
            },
            DeliveryType::Express => Self {
                avg_speed_kmh: 40.0,
                max_minutes: 120,
            },
            DeliveryType::Grouped => Self {
                avg_speed_kmh: 30.0,
                max_minutes: 480,
            },
            DeliveryType::Moving => Self {
                avg_speed_kmh: 25.0,
                max_minutes: 600,
            },
        }
    }
}

pub fn distance_between(
    estimator: &dyn DistanceEstimator,
    a: &Location,
    b: &Location,
) -> Result<f64, DeliveryError> {
    let from = a
        .point()
        .ok_or_else(|| DeliveryError::MissingCoordinates(a.address.clone()))?;
    let to = b
        .point()
        .ok_or_else(|| DeliveryError::MissingCoordinates(b.address.clone()))?;

    Ok(estimator.distance_km(&from, &to))
}

pub fn estimate_duration(distance_km: f64, profile: TravelProfile) -> u32 {
    if profile.avg_speed_kmh <= 0.0 {
        return profile.max_minutes.max(1);
    }

    let minutes = (distance_km.max(0.0) / profile.avg_speed_kmh * 60.0).ceil();
    (minutes as u32).clamp(1, profile.max_minutes.max(1))
}
