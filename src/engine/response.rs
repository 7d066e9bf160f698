use serde::Serialize;

use crate::models::delivery::Delivery;
use crate::models::location::Location;
use crate::models::variant::{GroupedZone, MovingDetails, Package};

/// Delivery as returned to callers, with its locations and variant records.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResponse {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub pickup: Location,
    pub dropoff: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<Package>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<GroupedZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving: Option<MovingDetails>,
}

impl DeliveryResponse {
    pub fn new(delivery: Delivery, pickup: Location, dropoff: Location) -> Self {
        Self {
            delivery,
            pickup,
            dropoff,
            package: None,
            zones: Vec::new(),
            moving: None,
        }
    }
}
