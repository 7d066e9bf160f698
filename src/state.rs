use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::engine::queue::{DispatchJob, DispatchQueue};
use crate::engine::roster::CourierRoster;
use crate::engine::service::{DeliveryService, EngineSettings};
use crate::geo::Haversine;
use crate::notifier::broadcast::BroadcastNotifier;
use crate::observability::metrics::Metrics;
use crate::pricing::{PricingConfig, PricingEngine};
use crate::repository::InMemoryRepository;

pub struct AppState {
    pub service: Arc<DeliveryService>,
    pub roster: CourierRoster,
    pub repository: Arc<InMemoryRepository>,
    pub events: BroadcastNotifier,
    pub metrics: Metrics,
    pub dispatch: Option<DispatchQueue>,
}

pub struct StateOptions {
    pub pricing: PricingConfig,
    pub settings: EngineSettings,
    pub event_buffer_size: usize,
    /// `None` leaves assignment to explicit calls.
    pub dispatch_queue_size: Option<usize>,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            settings: EngineSettings::default(),
            event_buffer_size: 1024,
            dispatch_queue_size: None,
        }
    }
}

impl StateOptions {
    pub fn from_config(config: &Config, pricing: PricingConfig) -> Self {
        Self {
            pricing,
            settings: config.engine_settings(),
            event_buffer_size: config.event_buffer_size,
            dispatch_queue_size: config
                .auto_dispatch
                .then_some(config.dispatch_queue_size),
        }
    }
}

impl AppState {
    pub fn new(options: StateOptions) -> (Self, Option<mpsc::Receiver<DispatchJob>>) {
        let repository = Arc::new(InMemoryRepository::new());
        let events = BroadcastNotifier::new(options.event_buffer_size);
        let metrics = Metrics::new();

        let mut service = DeliveryService::new(
            repository.clone(),
            Arc::new(events.clone()),
            Arc::new(Haversine),
            PricingEngine::new(options.pricing),
            options.settings,
            metrics.clone(),
        );

        let (dispatch, dispatch_rx) = match options.dispatch_queue_size {
            Some(size) => {
                let (queue, rx) = DispatchQueue::new(size, &metrics);
                service = service.with_dispatch(queue.clone());
                (Some(queue), Some(rx))
            }
            None => (None, None),
        };

        (
            Self {
                service: Arc::new(service),
                roster: CourierRoster::new(repository.clone()),
                repository,
                events,
                metrics,
                dispatch,
            },
            dispatch_rx,
        )
    }
}
