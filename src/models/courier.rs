use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::VehicleType;
use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverStatus {
    Offline,
    Online,
    Busy,
    Available,
}

impl DriverStatus {
    pub fn accepts_work(self) -> bool {
        matches!(self, DriverStatus::Online | DriverStatus::Available)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub profile_complete: bool,
    pub vehicle_documents_complete: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn documents_complete(&self) -> bool {
        self.profile_complete && self.vehicle_documents_complete
    }

    /// Status and paperwork allow the courier to take a delivery.
    pub fn is_eligible(&self) -> bool {
        self.status.accepts_work() && self.documents_complete()
    }

    /// Vehicle class and payload ceiling cover what the delivery needs.
    pub fn can_carry(&self, required: VehicleType, payload_kg: Option<f64>) -> bool {
        if self.vehicle_type < required {
            return false;
        }

        match payload_kg {
            Some(weight) => weight <= self.vehicle_type.max_payload_kg(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Courier, DriverStatus};
    use crate::models::delivery::VehicleType;

    fn courier(status: DriverStatus, vehicle_type: VehicleType) -> Courier {
        Courier {
            id: Uuid::new_v4(),
            name: "test-courier".to_string(),
            status,
            vehicle_type,
            location: None,
            location_updated_at: None,
            profile_complete: true,
            vehicle_documents_complete: true,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn busy_and_offline_couriers_are_not_eligible() {
        assert!(courier(DriverStatus::Online, VehicleType::Car).is_eligible());
        assert!(courier(DriverStatus::Available, VehicleType::Car).is_eligible());
        assert!(!courier(DriverStatus::Busy, VehicleType::Car).is_eligible());
        assert!(!courier(DriverStatus::Offline, VehicleType::Car).is_eligible());
    }

    #[test]
    fn missing_documents_block_eligibility() {
        let mut c = courier(DriverStatus::Online, VehicleType::Car);
        c.vehicle_documents_complete = false;
        assert!(!c.is_eligible());
    }

    #[test]
    fn larger_vehicle_can_carry_smaller_class() {
        let van = courier(DriverStatus::Online, VehicleType::Van);
        assert!(van.can_carry(VehicleType::Motorcycle, Some(15.0)));

        let moto = courier(DriverStatus::Online, VehicleType::Motorcycle);
        assert!(!moto.can_carry(VehicleType::Car, None));
        assert!(!moto.can_carry(VehicleType::Motorcycle, Some(25.0)));
    }
}
