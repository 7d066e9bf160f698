use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::actor::ActorRole;
use crate::models::delivery::DeliveryStatus;
use crate::models::location::GeoPoint;

/// One row of a delivery's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<ActorRole>,
    pub location: Option<GeoPoint>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TrackingEntry {
    pub fn new(delivery_id: Uuid, status: DeliveryStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            status,
            actor_id: None,
            actor_role: None,
            location: None,
            note: None,
            recorded_at: Utc::now(),
        }
    }
}
