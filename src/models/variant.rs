use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub weight_kg: f64,
    pub description: Option<String>,
    pub fragile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedZone {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub zone_number: u32,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub pickup_location_id: Uuid,
    pub dropoff_location_id: Uuid,
    pub distance_km: Option<f64>,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovingDetails {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub helpers: u32,
    pub floors: u32,
    pub has_elevator: bool,
    pub additional_services: Vec<String>,
    pub estimated_volume_m3: f64,
}
