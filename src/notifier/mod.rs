//! Lifecycle event publishing.
//!
//! The engine never waits on a publish: `publish_detached` hands the event to
//! a spawned task and only logs a failure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::actor::ActorRole;
use crate::models::assignment::AssignmentMode;
use crate::models::delivery::{DeliveryStatus, DeliveryType};
use crate::models::location::GeoPoint;

pub mod broadcast;

pub use broadcast::BroadcastNotifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created {
        delivery_id: Uuid,
        delivery_type: DeliveryType,
        final_price: f64,
        at: DateTime<Utc>,
    },
    Assigned {
        delivery_id: Uuid,
        courier_id: Uuid,
        mode: AssignmentMode,
        distance_km: Option<f64>,
        at: DateTime<Utc>,
    },
    StatusChanged {
        delivery_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
        actor_role: ActorRole,
        at: DateTime<Utc>,
    },
    LocationUpdated {
        delivery_id: Uuid,
        courier_id: Option<Uuid>,
        location: GeoPoint,
        at: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    pub fn delivery_id(&self) -> Uuid {
        match self {
            LifecycleEvent::Created { delivery_id, .. }
            | LifecycleEvent::Assigned { delivery_id, .. }
            | LifecycleEvent::StatusChanged { delivery_id, .. }
            | LifecycleEvent::LocationUpdated { delivery_id, .. } => *delivery_id,
        }
    }

    pub fn topic(&self) -> String {
        format!("deliveries.{}", self.delivery_id())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no subscribers for {0}")]
    NoSubscribers(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, event: LifecycleEvent) -> Result<(), NotifyError>;
}

/// Fire-and-forget publish. Failures are logged and dropped.
pub fn publish_detached(notifier: &Arc<dyn Notifier>, event: LifecycleEvent) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        let topic = event.topic();
        match notifier.publish(&topic, event).await {
            Ok(()) => {}
            Err(NotifyError::NoSubscribers(_)) => debug!(topic = %topic, "no event subscribers"),
            Err(err) => warn!(topic = %topic, error = %err, "lifecycle event not delivered"),
        }
    });
}
