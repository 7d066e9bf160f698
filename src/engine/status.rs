use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::roster::CourierRoster;
use crate::error::DeliveryError;
use crate::models::actor::{Actor, ActorRole};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::location::GeoPoint;
use crate::models::tracking::TrackingEntry;
use crate::notifier::{publish_detached, LifecycleEvent, Notifier};
use crate::repository::{Repository, StoreError};

use DeliveryStatus::{Assigned, Cancelled, Delivered, InProgress, Pending};

/// Re-reads allowed when another writer bumps the delivery version first.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Statuses `role` may move a delivery to from `from`.
pub fn allowed_transitions(from: DeliveryStatus, role: ActorRole) -> &'static [DeliveryStatus] {
    match (from, role) {
        (Pending, ActorRole::Client) => &[Cancelled],
        (Pending, ActorRole::Courier) => &[],
        (Pending, ActorRole::Admin) => &[Assigned, Cancelled],
        (Assigned, ActorRole::Client) => &[Cancelled],
        (Assigned, ActorRole::Courier | ActorRole::Admin) => &[InProgress, Cancelled],
        (InProgress, ActorRole::Client) => &[],
        (InProgress, ActorRole::Courier | ActorRole::Admin) => &[Delivered, Cancelled],
        (Delivered | Cancelled, _) => &[],
    }
}

pub fn ensure_transition(
    from: DeliveryStatus,
    to: DeliveryStatus,
    role: ActorRole,
) -> Result<(), DeliveryError> {
    if allowed_transitions(from, role).contains(&to) {
        Ok(())
    } else {
        Err(DeliveryError::InvalidTransition { from, to, role })
    }
}

/// Clients act on their own deliveries, couriers on the ones assigned to
/// them, admins on any.
pub fn is_participant(delivery: &Delivery, actor: &Actor) -> bool {
    match actor.role {
        ActorRole::Client => delivery.client_id == actor.id,
        ActorRole::Courier => delivery.courier_id == Some(actor.id),
        ActorRole::Admin => true,
    }
}

/// Moves `delivery` to `to` and stamps the lifecycle timestamps.
pub fn apply_transition(delivery: &mut Delivery, to: DeliveryStatus, at: DateTime<Utc>) {
    delivery.status = to;
    delivery.updated_at = at;

    match to {
        Assigned => delivery.assigned_at = Some(at),
        Delivered | Cancelled => delivery.closed_at = Some(at),
        Pending | InProgress => {}
    }
}

/// Appends a tracking entry once the lifecycle write it describes has been
/// committed. The committed state stands even if this write fails.
pub(crate) async fn append_tracking_after_commit(repository: &dyn Repository, entry: TrackingEntry) {
    let delivery_id = entry.delivery_id;
    let status = entry.status;
    if let Err(err) = repository.append_tracking(entry).await {
        warn!(
            delivery_id = %delivery_id,
            status = %status,
            error = %err,
            "tracking entry not recorded"
        );
    }
}

pub struct StatusTransitionEngine {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn Notifier>,
    roster: CourierRoster,
}

impl StatusTransitionEngine {
    pub fn new(repository: Arc<dyn Repository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            roster: CourierRoster::new(repository.clone()),
            repository,
            notifier,
        }
    }

    pub async fn transition(
        &self,
        delivery_id: Uuid,
        to: DeliveryStatus,
        actor: Actor,
        note: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<Delivery, DeliveryError> {
        let mut attempt = 0;

        let (from, updated) = loop {
            attempt += 1;
            let current = self.repository.load_delivery(delivery_id).await?;
            let from = current.status;

            if !is_participant(&current, &actor) {
                return Err(DeliveryError::InvalidTransition {
                    from,
                    to,
                    role: actor.role,
                });
            }
            ensure_transition(from, to, actor.role)?;

            if to == Assigned {
                return Err(DeliveryError::validation(
                    "status",
                    "moving to Assigned requires a courier; use assignment",
                ));
            }

            let expected_version = current.version;
            let mut next = current;
            apply_transition(&mut next, to, Utc::now());
            if to == Cancelled {
                next.cancellation_note = note.clone();
            }

            match self.write(next, expected_version).await {
                Ok(updated) => break (from, updated),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(delivery_id = %delivery_id, attempt, "status write lost a race; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        };

        let mut entry = TrackingEntry::new(delivery_id, to);
        entry.actor_id = Some(actor.id);
        entry.actor_role = Some(actor.role);
        entry.location = location;
        entry.note = note;
        append_tracking_after_commit(self.repository.as_ref(), entry).await;

        info!(
            delivery_id = %delivery_id,
            from = %from,
            to = %to,
            role = ?actor.role,
            "delivery status changed"
        );

        let at = updated.updated_at;
        publish_detached(
            &self.notifier,
            LifecycleEvent::StatusChanged {
                delivery_id,
                from,
                to,
                actor_role: actor.role,
                at,
            },
        );
        if let Some(point) = location {
            publish_detached(
                &self.notifier,
                LifecycleEvent::LocationUpdated {
                    delivery_id,
                    courier_id: updated.courier_id,
                    location: point,
                    at,
                },
            );
        }

        Ok(updated)
    }

    /// Records a position for an active delivery without changing its status.
    /// The assigned courier's last known location follows along.
    pub async fn record_location(
        &self,
        delivery_id: Uuid,
        actor: Actor,
        point: GeoPoint,
        note: Option<String>,
    ) -> Result<Delivery, DeliveryError> {
        let delivery = self.repository.load_delivery(delivery_id).await?;

        let active = matches!(delivery.status, Assigned | InProgress);
        let allowed = matches!(actor.role, ActorRole::Courier | ActorRole::Admin)
            && is_participant(&delivery, &actor);
        if !active || !allowed {
            return Err(DeliveryError::InvalidTransition {
                from: delivery.status,
                to: delivery.status,
                role: actor.role,
            });
        }

        if let Some(courier_id) = delivery.courier_id {
            self.roster.relocate(courier_id, point).await?;
        }

        let mut entry = TrackingEntry::new(delivery_id, delivery.status);
        entry.actor_id = Some(actor.id);
        entry.actor_role = Some(actor.role);
        entry.location = Some(point);
        entry.note = note;
        append_tracking_after_commit(self.repository.as_ref(), entry).await;

        debug!(delivery_id = %delivery_id, lat = point.lat, lng = point.lng, "location recorded");

        publish_detached(
            &self.notifier,
            LifecycleEvent::LocationUpdated {
                delivery_id,
                courier_id: delivery.courier_id,
                location: point,
                at: Utc::now(),
            },
        );

        Ok(delivery)
    }

    async fn write(&self, delivery: Delivery, expected_version: u64) -> Result<Delivery, StoreError> {
        match (delivery.status.is_terminal(), delivery.courier_id) {
            (true, Some(courier_id)) => {
                let (delivery, courier) = self
                    .repository
                    .commit_release(delivery, expected_version, courier_id)
                    .await?;
                debug!(courier_id = %courier.id, status = ?courier.status, "courier released");
                Ok(delivery)
            }
            _ => self.repository.save_delivery(delivery, expected_version).await,
        }
    }
}
