use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::assignment::AssignmentEngine;
use crate::engine::creation::{
    validate_address, validate_coordinates, CreateDeliveryRequest, CreationSettings,
    DeliveryCreator,
};
use crate::engine::queue::{DispatchJob, DispatchQueue};
use crate::engine::response::DeliveryResponse;
use crate::engine::status::{
    append_tracking_after_commit, ensure_transition, is_participant, StatusTransitionEngine,
};
use crate::error::DeliveryError;
use crate::geo::DistanceEstimator;
use crate::models::actor::{Actor, ActorRole};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::location::{GeoPoint, Location};
use crate::models::tracking::TrackingEntry;
use crate::notifier::{publish_detached, LifecycleEvent, Notifier};
use crate::observability::metrics::Metrics;
use crate::pricing::PricingEngine;
use crate::repository::Repository;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub creation: CreationSettings,
    pub max_assignment_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            creation: CreationSettings::default(),
            max_assignment_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropoffUpdate {
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Entry point for callers: creation, assignment and status changes, plus
/// the read side they need.
pub struct DeliveryService {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    creator: DeliveryCreator,
    assignment: AssignmentEngine,
    status: StatusTransitionEngine,
    metrics: Metrics,
    dispatch: Option<DispatchQueue>,
}

impl DeliveryService {
    pub fn new(
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        estimator: Arc<dyn DistanceEstimator>,
        pricing: PricingEngine,
        settings: EngineSettings,
        metrics: Metrics,
    ) -> Self {
        let creator = DeliveryCreator::new(
            repository.clone(),
            estimator.clone(),
            Arc::new(pricing),
            settings.creation,
        );
        let assignment = AssignmentEngine::new(
            repository.clone(),
            notifier.clone(),
            estimator,
            settings.max_assignment_attempts,
        );
        let status = StatusTransitionEngine::new(repository.clone(), notifier.clone());

        Self {
            repository,
            notifier,
            creator,
            assignment,
            status,
            metrics,
            dispatch: None,
        }
    }

    /// Newly created deliveries are handed to the dispatcher for automatic
    /// assignment.
    pub fn with_dispatch(mut self, queue: DispatchQueue) -> Self {
        self.dispatch = Some(queue);
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn create_delivery(
        &self,
        client_id: Uuid,
        request: CreateDeliveryRequest,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let response = self.creator.create(client_id, &request).await?;
        let delivery = &response.delivery;

        self.metrics
            .deliveries_created_total
            .with_label_values(&[delivery.delivery_type.as_str()])
            .inc();

        publish_detached(
            &self.notifier,
            LifecycleEvent::Created {
                delivery_id: delivery.id,
                delivery_type: delivery.delivery_type,
                final_price: delivery.final_price,
                at: delivery.created_at,
            },
        );

        if let Some(queue) = &self.dispatch {
            if let Err(err) = queue.enqueue(DispatchJob::new(delivery.id)).await {
                error!(delivery_id = %delivery.id, error = %err, "failed to queue delivery for dispatch");
            }
        }

        Ok(response)
    }

    pub async fn assign_delivery(
        &self,
        delivery_id: Uuid,
        courier_id: Option<Uuid>,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let start = Instant::now();
        let result = self.assignment.assign(delivery_id, courier_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(DeliveryError::NoAvailableCourier) => "no_courier",
            Err(DeliveryError::CourierNotEligible { .. }) => "not_eligible",
            Err(err) if err.is_conflict() => "conflict",
            Err(_) => "error",
        };
        self.metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .assignments_total
            .with_label_values(&[outcome])
            .inc();

        let assigned = result?;
        self.metrics
            .status_transitions_total
            .with_label_values(&[DeliveryStatus::Assigned.as_str()])
            .inc();

        self.view(assigned.delivery).await
    }

    pub async fn update_status(
        &self,
        delivery_id: Uuid,
        status: DeliveryStatus,
        actor: Actor,
        note: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<DeliveryResponse, DeliveryError> {
        if status == DeliveryStatus::Assigned {
            let current = self.repository.load_delivery(delivery_id).await?;
            ensure_transition(current.status, status, actor.role)?;
            return self.assign_delivery(delivery_id, None).await;
        }

        let delivery = self
            .status
            .transition(delivery_id, status, actor, note, location)
            .await?;

        self.metrics
            .status_transitions_total
            .with_label_values(&[status.as_str()])
            .inc();

        self.view(delivery).await
    }

    pub async fn record_location(
        &self,
        delivery_id: Uuid,
        actor: Actor,
        point: GeoPoint,
        note: Option<String>,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let delivery = self
            .status
            .record_location(delivery_id, actor, point, note)
            .await?;
        self.view(delivery).await
    }

    /// Moves the dropoff of a pending delivery and reprices it.
    pub async fn update_dropoff(
        &self,
        delivery_id: Uuid,
        actor: Actor,
        update: DropoffUpdate,
    ) -> Result<DeliveryResponse, DeliveryError> {
        validate_address("address", &update.address)?;
        validate_coordinates("dropoff", update.lat, update.lng)?;

        let current = self.repository.load_delivery(delivery_id).await?;
        if actor.role == ActorRole::Courier || !is_participant(&current, &actor) {
            return Err(DeliveryError::InvalidTransition {
                from: current.status,
                to: current.status,
                role: actor.role,
            });
        }
        if current.status != DeliveryStatus::Pending {
            return Err(DeliveryError::validation(
                "status",
                "the dropoff can only change while the delivery is pending",
            ));
        }

        let pickup = self
            .repository
            .load_location(current.pickup_location_id)
            .await?;
        let dropoff = Location::new(update.address.trim(), update.lat, update.lng);
        let (route, price) = self.creator.reprice(&current, &pickup, &dropoff).await?;

        let dropoff = self.repository.save_location(dropoff).await?;

        let expected_version = current.version;
        let mut next = current;
        next.dropoff_location_id = dropoff.id;
        next.distance_km = route.distance_km;
        next.duration_min = route.duration_min;
        next.apply_price(price);
        next.updated_at = Utc::now();

        let saved = match self.repository.save_delivery(next, expected_version).await {
            Ok(saved) => saved,
            Err(err) => {
                if let Err(cleanup) = self.repository.remove_location(dropoff.id).await {
                    warn!(location_id = %dropoff.id, error = %cleanup, "unused dropoff location left behind");
                }
                return Err(err.into());
            }
        };

        let mut entry = TrackingEntry::new(delivery_id, saved.status);
        entry.actor_id = Some(actor.id);
        entry.actor_role = Some(actor.role);
        entry.note = Some(format!("dropoff moved to {}", dropoff.address));
        append_tracking_after_commit(self.repository.as_ref(), entry).await;

        info!(
            delivery_id = %delivery_id,
            final_price = saved.final_price,
            "delivery dropoff updated"
        );

        self.view(saved).await
    }

    pub async fn get_delivery(&self, delivery_id: Uuid) -> Result<DeliveryResponse, DeliveryError> {
        let delivery = self.repository.load_delivery(delivery_id).await?;
        self.view(delivery).await
    }

    pub async fn tracking(&self, delivery_id: Uuid) -> Result<Vec<TrackingEntry>, DeliveryError> {
        self.repository.load_delivery(delivery_id).await?;
        Ok(self.repository.list_tracking(delivery_id).await?)
    }

    async fn view(&self, delivery: Delivery) -> Result<DeliveryResponse, DeliveryError> {
        let pickup = self
            .repository
            .load_location(delivery.pickup_location_id)
            .await?;
        let dropoff = self
            .repository
            .load_location(delivery.dropoff_location_id)
            .await?;

        let id = delivery.id;
        let mut response = DeliveryResponse::new(delivery, pickup, dropoff);
        response.package = self.repository.load_package(id).await?;
        response.zones = self.repository.load_zones(id).await?;
        response.moving = self.repository.load_moving_details(id).await?;

        Ok(response)
    }
}
