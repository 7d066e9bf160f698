use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Entity, Repository, Result, StoreError};
use crate::models::courier::{Courier, DriverStatus};
use crate::models::delivery::{Delivery, DeliveryStatus, VehicleType};
use crate::models::location::Location;
use crate::models::tracking::TrackingEntry;
use crate::models::variant::{GroupedZone, MovingDetails, Package};

/// Process-local store backed by `DashMap`s.
///
/// Multi-entity commits always lock the delivery shard before the courier
/// shard, and single-entity writes hold one guard at a time, so no two
/// writers can wait on each other in opposite order.
#[derive(Default)]
pub struct InMemoryRepository {
    deliveries: DashMap<Uuid, Delivery>,
    locations: DashMap<Uuid, Location>,
    packages: DashMap<Uuid, Package>,
    zones: DashMap<Uuid, Vec<GroupedZone>>,
    moving: DashMap<Uuid, MovingDetails>,
    couriers: DashMap<Uuid, Courier>,
    tracking: DashMap<Uuid, Vec<TrackingEntry>>,
    fail_writes: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }

    pub fn courier_count(&self) -> usize {
        self.couriers.len()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn conflict(entity: Entity, id: Uuid, expected: u64, actual: u64) -> StoreError {
    StoreError::VersionConflict {
        entity,
        id,
        expected,
        actual,
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_delivery(&self, mut delivery: Delivery, expected_version: u64) -> Result<Delivery> {
        self.check_writable()?;

        if expected_version == 0 {
            return match self.deliveries.entry(delivery.id) {
                Entry::Occupied(existing) => Err(conflict(
                    Entity::Delivery,
                    delivery.id,
                    0,
                    existing.get().version,
                )),
                Entry::Vacant(slot) => {
                    delivery.version = 1;
                    slot.insert(delivery.clone());
                    Ok(delivery)
                }
            };
        }

        let mut stored = self.deliveries.get_mut(&delivery.id).ok_or(StoreError::NotFound {
            entity: Entity::Delivery,
            id: delivery.id,
        })?;

        if stored.version != expected_version {
            return Err(conflict(
                Entity::Delivery,
                delivery.id,
                expected_version,
                stored.version,
            ));
        }

        delivery.version = expected_version + 1;
        *stored = delivery.clone();
        Ok(delivery)
    }

    async fn load_delivery(&self, id: Uuid) -> Result<Delivery> {
        self.deliveries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound {
                entity: Entity::Delivery,
                id,
            })
    }

    async fn save_location(&self, location: Location) -> Result<Location> {
        self.check_writable()?;
        self.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn load_location(&self, id: Uuid) -> Result<Location> {
        self.locations
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound {
                entity: Entity::Location,
                id,
            })
    }

    async fn remove_location(&self, id: Uuid) -> Result<()> {
        self.check_writable()?;
        self.locations.remove(&id);
        Ok(())
    }

    async fn save_package(&self, package: Package) -> Result<()> {
        self.check_writable()?;
        self.packages.insert(package.delivery_id, package);
        Ok(())
    }

    async fn load_package(&self, delivery_id: Uuid) -> Result<Option<Package>> {
        Ok(self.packages.get(&delivery_id).map(|entry| entry.value().clone()))
    }

    async fn save_zones(&self, delivery_id: Uuid, zones: Vec<GroupedZone>) -> Result<()> {
        self.check_writable()?;
        self.zones.insert(delivery_id, zones);
        Ok(())
    }

    async fn load_zones(&self, delivery_id: Uuid) -> Result<Vec<GroupedZone>> {
        Ok(self
            .zones
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save_moving_details(&self, details: MovingDetails) -> Result<()> {
        self.check_writable()?;
        self.moving.insert(details.delivery_id, details);
        Ok(())
    }

    async fn load_moving_details(&self, delivery_id: Uuid) -> Result<Option<MovingDetails>> {
        Ok(self.moving.get(&delivery_id).map(|entry| entry.value().clone()))
    }

    async fn find_eligible_couriers(&self, vehicle_type: VehicleType) -> Result<Vec<Courier>> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| {
                let courier = entry.value();
                courier.is_eligible() && courier.vehicle_type >= vehicle_type
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn load_courier(&self, id: Uuid) -> Result<Courier> {
        self.couriers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound {
                entity: Entity::Courier,
                id,
            })
    }

    async fn list_couriers(&self) -> Result<Vec<Courier>> {
        Ok(self
            .couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save_courier(&self, mut courier: Courier, expected_version: u64) -> Result<Courier> {
        self.check_writable()?;

        if expected_version == 0 {
            return match self.couriers.entry(courier.id) {
                Entry::Occupied(existing) => Err(conflict(
                    Entity::Courier,
                    courier.id,
                    0,
                    existing.get().version,
                )),
                Entry::Vacant(slot) => {
                    courier.version = 1;
                    slot.insert(courier.clone());
                    Ok(courier)
                }
            };
        }

        let mut stored = self.couriers.get_mut(&courier.id).ok_or(StoreError::NotFound {
            entity: Entity::Courier,
            id: courier.id,
        })?;

        if stored.version != expected_version {
            return Err(conflict(
                Entity::Courier,
                courier.id,
                expected_version,
                stored.version,
            ));
        }

        courier.version = expected_version + 1;
        *stored = courier.clone();
        Ok(courier)
    }

    async fn commit_assignment(
        &self,
        mut delivery: Delivery,
        expected_version: u64,
        courier_id: Uuid,
    ) -> Result<(Delivery, Courier)> {
        self.check_writable()?;

        let mut stored = self.deliveries.get_mut(&delivery.id).ok_or(StoreError::NotFound {
            entity: Entity::Delivery,
            id: delivery.id,
        })?;

        let still_open = stored.status == DeliveryStatus::Pending && stored.courier_id.is_none();
        if stored.version != expected_version || !still_open {
            return Err(conflict(
                Entity::Delivery,
                delivery.id,
                expected_version,
                stored.version,
            ));
        }

        let mut courier = self.couriers.get_mut(&courier_id).ok_or(StoreError::NotFound {
            entity: Entity::Courier,
            id: courier_id,
        })?;

        if !courier.status.accepts_work() {
            return Err(StoreError::CourierUnavailable(courier_id));
        }

        courier.status = DriverStatus::Busy;
        courier.version += 1;
        courier.updated_at = Utc::now();

        delivery.version = expected_version + 1;
        *stored = delivery.clone();

        Ok((delivery, courier.clone()))
    }

    async fn commit_release(
        &self,
        mut delivery: Delivery,
        expected_version: u64,
        courier_id: Uuid,
    ) -> Result<(Delivery, Courier)> {
        self.check_writable()?;

        let mut stored = self.deliveries.get_mut(&delivery.id).ok_or(StoreError::NotFound {
            entity: Entity::Delivery,
            id: delivery.id,
        })?;

        if stored.version != expected_version {
            return Err(conflict(
                Entity::Delivery,
                delivery.id,
                expected_version,
                stored.version,
            ));
        }

        let mut courier = self.couriers.get_mut(&courier_id).ok_or(StoreError::NotFound {
            entity: Entity::Courier,
            id: courier_id,
        })?;

        // An offline courier stays offline.
        if courier.status == DriverStatus::Busy {
            courier.status = DriverStatus::Available;
            courier.version += 1;
            courier.updated_at = Utc::now();
        }

        delivery.version = expected_version + 1;
        *stored = delivery.clone();

        Ok((delivery, courier.clone()))
    }

    async fn append_tracking(&self, entry: TrackingEntry) -> Result<()> {
        self.check_writable()?;
        self.tracking.entry(entry.delivery_id).or_default().push(entry);
        Ok(())
    }

    async fn list_tracking(&self, delivery_id: Uuid) -> Result<Vec<TrackingEntry>> {
        Ok(self
            .tracking
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InMemoryRepository;
    use crate::models::courier::{Courier, DriverStatus};
    use crate::models::delivery::{
        Delivery, DeliveryStatus, DeliveryType, PaymentMethod, PriceBreakdown, VehicleType,
    };
    use crate::models::location::Location;
    use crate::repository::{Repository, StoreError};

    fn delivery() -> Delivery {
        let now = Utc::now();
        Delivery {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            courier_id: None,
            delivery_type: DeliveryType::Standard,
            status: DeliveryStatus::Pending,
            pickup_location_id: Uuid::new_v4(),
            dropoff_location_id: Uuid::new_v4(),
            distance_km: Some(3.0),
            duration_min: Some(6),
            vehicle_type: VehicleType::Motorcycle,
            payload_kg: Some(2.0),
            waiting_min: 0,
            base_price: 500.0,
            final_price: 800.0,
            price: PriceBreakdown::default(),
            payment_method: PaymentMethod::Cash,
            cancellation_note: None,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            closed_at: None,
            version: 0,
        }
    }

    fn courier(status: DriverStatus) -> Courier {
        Courier {
            id: Uuid::new_v4(),
            name: "test-courier".to_string(),
            status,
            vehicle_type: VehicleType::Car,
            location: None,
            location_updated_at: None,
            profile_complete: true,
            vehicle_documents_complete: true,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stale_delivery_write_is_rejected() {
        let repo = InMemoryRepository::new();
        let saved = repo.save_delivery(delivery(), 0).await.unwrap();
        assert_eq!(saved.version, 1);

        let updated = repo.save_delivery(saved.clone(), 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let err = repo.save_delivery(saved, 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn removed_location_is_gone() {
        let repo = InMemoryRepository::new();
        let saved = repo
            .save_location(Location::new("Akwa, Douala", Some(4.045), Some(9.765)))
            .await
            .unwrap();
        assert_eq!(repo.location_count(), 1);

        repo.remove_location(saved.id).await.unwrap();
        assert_eq!(repo.location_count(), 0);
        assert!(matches!(
            repo.load_location(saved.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn double_insert_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let d = delivery();
        repo.save_delivery(d.clone(), 0).await.unwrap();

        assert!(repo.save_delivery(d, 0).await.is_err());
    }

    #[tokio::test]
    async fn assignment_commit_marks_courier_busy() {
        let repo = InMemoryRepository::new();
        let saved = repo.save_delivery(delivery(), 0).await.unwrap();
        let c = repo.save_courier(courier(DriverStatus::Online), 0).await.unwrap();

        let mut next = saved.clone();
        next.status = DeliveryStatus::Assigned;
        next.courier_id = Some(c.id);

        let (d, c) = repo.commit_assignment(next, saved.version, c.id).await.unwrap();
        assert_eq!(d.version, 2);
        assert_eq!(c.status, DriverStatus::Busy);
    }

    #[tokio::test]
    async fn busy_courier_fails_the_whole_commit() {
        let repo = InMemoryRepository::new();
        let saved = repo.save_delivery(delivery(), 0).await.unwrap();
        let c = repo.save_courier(courier(DriverStatus::Busy), 0).await.unwrap();

        let mut next = saved.clone();
        next.status = DeliveryStatus::Assigned;
        next.courier_id = Some(c.id);

        let err = repo.commit_assignment(next, saved.version, c.id).await.unwrap_err();
        assert!(matches!(err, StoreError::CourierUnavailable(id) if id == c.id));

        let stored = repo.load_delivery(saved.id).await.unwrap();
        assert_eq!(stored.status, DeliveryStatus::Pending);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn release_frees_busy_courier_only() {
        let repo = InMemoryRepository::new();
        let saved = repo.save_delivery(delivery(), 0).await.unwrap();
        let busy = repo.save_courier(courier(DriverStatus::Busy), 0).await.unwrap();
        let offline = repo.save_courier(courier(DriverStatus::Offline), 0).await.unwrap();

        let (d, c) = repo.commit_release(saved.clone(), 1, busy.id).await.unwrap();
        assert_eq!(c.status, DriverStatus::Available);

        let (_, c) = repo.commit_release(d.clone(), d.version, offline.id).await.unwrap();
        assert_eq!(c.status, DriverStatus::Offline);
    }

    #[tokio::test]
    async fn eligible_search_filters_status_documents_and_vehicle() {
        let repo = InMemoryRepository::new();
        repo.save_courier(courier(DriverStatus::Online), 0).await.unwrap();
        repo.save_courier(courier(DriverStatus::Busy), 0).await.unwrap();

        let mut paperwork = courier(DriverStatus::Available);
        paperwork.profile_complete = false;
        repo.save_courier(paperwork, 0).await.unwrap();

        assert_eq!(repo.find_eligible_couriers(VehicleType::Car).await.unwrap().len(), 1);
        assert!(repo.find_eligible_couriers(VehicleType::Van).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_writes_surface_backend_errors() {
        let repo = InMemoryRepository::new();
        repo.set_fail_writes(true);

        let err = repo.save_delivery(delivery(), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
