use std::sync::Arc;

use prometheus::IntGauge;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::service::DeliveryService;
use crate::error::{AppError, DeliveryError};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchJob {
    pub delivery_id: Uuid,
    pub attempt: u32,
}

impl DispatchJob {
    pub fn new(delivery_id: Uuid) -> Self {
        Self {
            delivery_id,
            attempt: 1,
        }
    }

    fn retry(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    pub retry_delay: Duration,
    /// Jobs that have found no courier this many times are dropped.
    pub max_attempts: u32,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(250),
            max_attempts: 20,
        }
    }
}

/// Sending half of the automatic dispatch channel.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchJob>,
    depth: IntGauge,
}

impl DispatchQueue {
    pub fn new(size: usize, metrics: &Metrics) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(size.max(1));
        let queue = Self {
            tx,
            depth: metrics.dispatch_queue_depth.clone(),
        };
        (queue, rx)
    }

    pub async fn enqueue(&self, job: DispatchJob) -> Result<(), AppError> {
        self.tx
            .send(job)
            .await
            .map_err(|err| AppError::Internal(format!("dispatch queue send failed: {err}")))?;

        self.depth.inc();
        Ok(())
    }
}

/// Drains the dispatch queue, assigning each delivery to its nearest eligible
/// courier. Deliveries that find nobody go back on the queue after the retry
/// delay until `max_attempts` is reached. Deliveries that were assigned or
/// closed meanwhile are dropped.
pub async fn run_dispatcher(
    service: Arc<DeliveryService>,
    queue: DispatchQueue,
    mut rx: mpsc::Receiver<DispatchJob>,
    settings: DispatcherSettings,
) {
    info!(max_attempts = settings.max_attempts, "dispatcher started");

    while let Some(job) = rx.recv().await {
        queue.depth.dec();

        match service.assign_delivery(job.delivery_id, None).await {
            Ok(response) => {
                debug!(
                    delivery_id = %job.delivery_id,
                    courier_id = ?response.delivery.courier_id,
                    attempt = job.attempt,
                    "dispatch job completed"
                );
            }
            Err(DeliveryError::NoAvailableCourier) if job.attempt >= settings.max_attempts => {
                error!(
                    delivery_id = %job.delivery_id,
                    attempts = job.attempt,
                    "no courier found within the dispatch budget; delivery stays pending"
                );
            }
            Err(DeliveryError::NoAvailableCourier) => {
                warn!(
                    delivery_id = %job.delivery_id,
                    attempt = job.attempt,
                    "no eligible couriers; re-queueing delivery"
                );
                let queue = queue.clone();
                let retry_delay = settings.retry_delay;
                tokio::spawn(async move {
                    sleep(retry_delay).await;
                    if let Err(err) = queue.enqueue(job.retry()).await {
                        error!(delivery_id = %job.delivery_id, error = %err, "failed to re-queue delivery");
                    }
                });
            }
            Err(err @ (DeliveryError::InvalidTransition { .. } | DeliveryError::NotFound(_))) => {
                info!(delivery_id = %job.delivery_id, reason = %err, "dropping dispatch job");
            }
            Err(err) if err.is_conflict() => {
                info!(delivery_id = %job.delivery_id, reason = %err, "delivery no longer pending; dropping dispatch job");
            }
            Err(err) => {
                error!(delivery_id = %job.delivery_id, error = %err, "failed to dispatch delivery");
            }
        }
    }

    warn!("dispatcher stopped: queue channel closed");
}
