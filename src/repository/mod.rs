//! Persistence contract consumed by the engine.
//!
//! Every delivery and courier carries a `version`. Writers pass the version
//! they read; a store must reject the write when the stored version differs.
//! A version of zero means "insert, must not exist yet".

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::courier::Courier;
use crate::models::delivery::{Delivery, VehicleType};
use crate::models::location::Location;
use crate::models::tracking::TrackingEntry;
use crate::models::variant::{GroupedZone, MovingDetails, Package};

pub mod memory;

pub use memory::InMemoryRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Delivery,
    Location,
    Courier,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Delivery => "delivery",
            Entity::Location => "location",
            Entity::Courier => "courier",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("{entity} {id}: expected version {expected}, found {actual}")]
    VersionConflict {
        entity: Entity,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    /// The courier half of an assignment commit failed: someone else made
    /// the courier busy (or took them offline) first.
    #[error("courier {0} is no longer available")]
    CourierUnavailable(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Compare-and-swap write. Returns the stored delivery with its new
    /// version.
    async fn save_delivery(&self, delivery: Delivery, expected_version: u64) -> Result<Delivery>;

    async fn load_delivery(&self, id: Uuid) -> Result<Delivery>;

    async fn save_location(&self, location: Location) -> Result<Location>;

    async fn load_location(&self, id: Uuid) -> Result<Location>;

    /// Drops a location that no delivery references, such as one written for
    /// a delivery update that then lost its version check.
    async fn remove_location(&self, id: Uuid) -> Result<()>;

    async fn save_package(&self, package: Package) -> Result<()>;

    async fn load_package(&self, delivery_id: Uuid) -> Result<Option<Package>>;

    async fn save_zones(&self, delivery_id: Uuid, zones: Vec<GroupedZone>) -> Result<()>;

    async fn load_zones(&self, delivery_id: Uuid) -> Result<Vec<GroupedZone>>;

    async fn save_moving_details(&self, details: MovingDetails) -> Result<()>;

    async fn load_moving_details(&self, delivery_id: Uuid) -> Result<Option<MovingDetails>>;

    /// Couriers whose status and documents make them assignable and whose
    /// vehicle class is at least `vehicle_type`.
    async fn find_eligible_couriers(&self, vehicle_type: VehicleType) -> Result<Vec<Courier>>;

    async fn load_courier(&self, id: Uuid) -> Result<Courier>;

    async fn list_couriers(&self) -> Result<Vec<Courier>>;

    async fn save_courier(&self, courier: Courier, expected_version: u64) -> Result<Courier>;

    /// Writes the assigned delivery and marks the courier busy as one unit.
    /// Fails with `VersionConflict` when the delivery moved on and with
    /// `CourierUnavailable` when the courier no longer accepts work. Neither
    /// write happens on failure.
    async fn commit_assignment(
        &self,
        delivery: Delivery,
        expected_version: u64,
        courier_id: Uuid,
    ) -> Result<(Delivery, Courier)>;

    /// Writes a closed delivery and frees its busy courier as one unit.
    async fn commit_release(
        &self,
        delivery: Delivery,
        expected_version: u64,
        courier_id: Uuid,
    ) -> Result<(Delivery, Courier)>;

    async fn append_tracking(&self, entry: TrackingEntry) -> Result<()>;

    async fn list_tracking(&self, delivery_id: Uuid) -> Result<Vec<TrackingEntry>>;
}
