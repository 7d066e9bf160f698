use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::scoring::rank_candidates;
use crate::engine::status::{append_tracking_after_commit, apply_transition, ensure_transition};
use crate::error::DeliveryError;
use crate::geo::DistanceEstimator;
use crate::models::actor::ActorRole;
use crate::models::assignment::{Assignment, AssignmentMode};
use crate::models::courier::Courier;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::tracking::TrackingEntry;
use crate::notifier::{publish_detached, LifecycleEvent, Notifier};
use crate::repository::{Repository, StoreError};

#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub delivery: Delivery,
    pub courier: Courier,
    pub assignment: Assignment,
}

pub struct AssignmentEngine {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    estimator: Arc<dyn DistanceEstimator>,
    max_attempts: u32,
}

impl AssignmentEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        estimator: Arc<dyn DistanceEstimator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            repository,
            notifier,
            estimator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Links a courier to a pending delivery. With `courier_id` the named
    /// courier is checked and used; without it the nearest eligible courier
    /// is searched for.
    pub async fn assign(
        &self,
        delivery_id: Uuid,
        courier_id: Option<Uuid>,
    ) -> Result<AssignmentOutcome, DeliveryError> {
        let delivery = self.repository.load_delivery(delivery_id).await?;
        ensure_assignable(&delivery)?;

        let outcome = match courier_id {
            Some(courier_id) => self.assign_manual(delivery, courier_id).await?,
            None => self.assign_automatic(delivery).await?,
        };

        let mut entry = TrackingEntry::new(delivery_id, DeliveryStatus::Assigned);
        entry.location = outcome.courier.location;
        entry.note = Some(format!(
            "{} assignment to {}",
            outcome.assignment.mode.as_str(),
            outcome.courier.name
        ));
        append_tracking_after_commit(self.repository.as_ref(), entry).await;

        info!(
            delivery_id = %delivery_id,
            courier_id = %outcome.courier.id,
            mode = outcome.assignment.mode.as_str(),
            distance_km = ?outcome.assignment.distance_km,
            attempts = outcome.assignment.attempts,
            "delivery assigned"
        );

        publish_detached(
            &self.notifier,
            LifecycleEvent::Assigned {
                delivery_id,
                courier_id: outcome.courier.id,
                mode: outcome.assignment.mode,
                distance_km: outcome.assignment.distance_km,
                at: outcome.assignment.assigned_at,
            },
        );

        Ok(outcome)
    }

    async fn assign_manual(
        &self,
        delivery: Delivery,
        courier_id: Uuid,
    ) -> Result<AssignmentOutcome, DeliveryError> {
        let courier = self.repository.load_courier(courier_id).await?;
        check_eligibility(&courier, &delivery)?;

        let pickup = self
            .repository
            .load_location(delivery.pickup_location_id)
            .await?
            .point();
        let distance_km = match (courier.location, pickup) {
            (Some(from), Some(to)) => Some(self.estimator.distance_km(&from, &to)),
            _ => None,
        };

        self.commit(delivery, courier.id, AssignmentMode::Manual, distance_km, 1)
            .await
            .map_err(|err| match err {
                StoreError::VersionConflict { .. } => lost_race(courier_id),
                other => other.into(),
            })
    }

    async fn assign_automatic(&self, delivery: Delivery) -> Result<AssignmentOutcome, DeliveryError> {
        let pickup_location = self
            .repository
            .load_location(delivery.pickup_location_id)
            .await?;
        let pickup = pickup_location
            .point()
            .ok_or_else(|| DeliveryError::MissingCoordinates(pickup_location.address.clone()))?;

        let mut excluded: HashSet<Uuid> = HashSet::new();

        for attempt in 1..=self.max_attempts {
            let eligible: Vec<Courier> = self
                .repository
                .find_eligible_couriers(delivery.vehicle_type)
                .await?
                .into_iter()
                .filter(|courier| {
                    !excluded.contains(&courier.id)
                        && courier.is_eligible()
                        && courier.can_carry(delivery.vehicle_type, delivery.payload_kg)
                })
                .collect();

            let best = rank_candidates(eligible, &pickup, self.estimator.as_ref())
                .into_iter()
                .next()
                .ok_or(DeliveryError::NoAvailableCourier)?;

            debug!(
                delivery_id = %delivery.id,
                courier_id = %best.courier.id,
                distance_km = best.distance_km,
                attempt,
                "nearest courier selected"
            );

            match self
                .commit(
                    delivery.clone(),
                    best.courier.id,
                    AssignmentMode::Automatic,
                    Some(best.distance_km),
                    attempt,
                )
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::CourierUnavailable(taken)) => {
                    warn!(
                        delivery_id = %delivery.id,
                        courier_id = %taken,
                        attempt,
                        "courier taken concurrently; searching again"
                    );
                    excluded.insert(taken);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(DeliveryError::AssignmentConflict(format!(
                        "delivery {} changed during assignment",
                        delivery.id
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        }

        // The delivery is still pending; every candidate was taken under us.
        warn!(
            delivery_id = %delivery.id,
            attempts = self.max_attempts,
            "no courier could be secured within the attempt budget"
        );
        Err(DeliveryError::NoAvailableCourier)
    }

    async fn commit(
        &self,
        delivery: Delivery,
        courier_id: Uuid,
        mode: AssignmentMode,
        distance_km: Option<f64>,
        attempts: u32,
    ) -> Result<AssignmentOutcome, StoreError> {
        let expected_version = delivery.version;
        let now = Utc::now();

        let mut next = delivery;
        next.courier_id = Some(courier_id);
        apply_transition(&mut next, DeliveryStatus::Assigned, now);

        let (delivery, courier) = self
            .repository
            .commit_assignment(next, expected_version, courier_id)
            .await?;

        Ok(AssignmentOutcome {
            assignment: Assignment {
                delivery_id: delivery.id,
                courier_id: courier.id,
                mode,
                distance_km,
                attempts,
                assigned_at: now,
            },
            delivery,
            courier,
        })
    }
}

fn lost_race(courier_id: Uuid) -> DeliveryError {
    DeliveryError::AssignmentConflict(format!(
        "delivery changed before courier {courier_id} could be assigned"
    ))
}

/// A delivery can take a courier only while pending and unlinked. Closed
/// deliveries are a hard error; anything else means another assignment won.
fn ensure_assignable(delivery: &Delivery) -> Result<(), DeliveryError> {
    if delivery.status.is_terminal() {
        return Err(DeliveryError::InvalidTransition {
            from: delivery.status,
            to: DeliveryStatus::Assigned,
            role: ActorRole::Admin,
        });
    }

    if delivery.status != DeliveryStatus::Pending || delivery.courier_id.is_some() {
        return Err(DeliveryError::AssignmentConflict(format!(
            "delivery {} is already {}",
            delivery.id, delivery.status
        )));
    }

    ensure_transition(delivery.status, DeliveryStatus::Assigned, ActorRole::Admin)
}

pub fn check_eligibility(courier: &Courier, delivery: &Delivery) -> Result<(), DeliveryError> {
    let reason = if !courier.status.accepts_work() {
        Some(format!("status is {:?}", courier.status))
    } else if !courier.documents_complete() {
        Some("profile or vehicle documents incomplete".to_string())
    } else if !courier.can_carry(delivery.vehicle_type, delivery.payload_kg) {
        Some(format!(
            "{} cannot serve a {} delivery",
            courier.vehicle_type, delivery.vehicle_type
        ))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DeliveryError::CourierNotEligible {
            courier_id: courier.id,
            reason,
        }),
        None => Ok(()),
    }
}
