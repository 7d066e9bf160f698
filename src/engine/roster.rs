use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::models::courier::{Courier, DriverStatus};
use crate::models::delivery::VehicleType;
use crate::models::location::GeoPoint;
use crate::repository::{Repository, StoreError};

const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCourierRequest {
    pub name: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default = "default_status")]
    pub status: DriverStatus,
    #[serde(default = "default_true")]
    pub profile_complete: bool,
    #[serde(default = "default_true")]
    pub vehicle_documents_complete: bool,
}

fn default_status() -> DriverStatus {
    DriverStatus::Available
}

fn default_true() -> bool {
    true
}

/// Courier records as seen by operators: registration, availability and
/// position reports. Busy is owned by assignment and release.
#[derive(Clone)]
pub struct CourierRoster {
    repository: Arc<dyn Repository>,
}

impl CourierRoster {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn register(&self, request: RegisterCourierRequest) -> Result<Courier, DeliveryError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DeliveryError::validation("name", "cannot be empty"));
        }
        if request.status == DriverStatus::Busy {
            return Err(DeliveryError::validation(
                "status",
                "busy is only set by assignment",
            ));
        }

        let now = Utc::now();
        let courier = Courier {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: request.status,
            vehicle_type: request.vehicle_type,
            location: request.location,
            location_updated_at: request.location.map(|_| now),
            profile_complete: request.profile_complete,
            vehicle_documents_complete: request.vehicle_documents_complete,
            version: 0,
            updated_at: now,
        };

        let saved = self.repository.save_courier(courier, 0).await?;
        info!(courier_id = %saved.id, vehicle_type = %saved.vehicle_type, "courier registered");
        Ok(saved)
    }

    pub async fn list(&self) -> Result<Vec<Courier>, DeliveryError> {
        Ok(self.repository.list_couriers().await?)
    }

    pub async fn get(&self, courier_id: Uuid) -> Result<Courier, DeliveryError> {
        Ok(self.repository.load_courier(courier_id).await?)
    }

    pub async fn set_status(
        &self,
        courier_id: Uuid,
        status: DriverStatus,
    ) -> Result<Courier, DeliveryError> {
        if status == DriverStatus::Busy {
            return Err(DeliveryError::validation(
                "status",
                "busy is only set by assignment",
            ));
        }

        self.update(courier_id, |courier| {
            if courier.status == DriverStatus::Busy {
                return Err(DeliveryError::AssignmentConflict(format!(
                    "courier {} is on an active delivery",
                    courier.id
                )));
            }
            courier.status = status;
            Ok(())
        })
        .await
    }

    pub async fn relocate(&self, courier_id: Uuid, point: GeoPoint) -> Result<Courier, DeliveryError> {
        self.update(courier_id, |courier| {
            courier.location = Some(point);
            courier.location_updated_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn update<F>(&self, courier_id: Uuid, mut change: F) -> Result<Courier, DeliveryError>
    where
        F: FnMut(&mut Courier) -> Result<(), DeliveryError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut courier = self.repository.load_courier(courier_id).await?;
            let expected_version = courier.version;
            change(&mut courier)?;
            courier.updated_at = Utc::now();

            match self.repository.save_courier(courier, expected_version).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}
