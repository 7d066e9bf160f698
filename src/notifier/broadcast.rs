use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{LifecycleEvent, Notifier, NotifyError};

/// In-process fan-out over a `tokio::sync::broadcast` channel. Subscribers
/// that lag lose the oldest events.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastNotifier {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn publish(&self, topic: &str, event: LifecycleEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers(topic.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::BroadcastNotifier;
    use crate::models::delivery::DeliveryType;
    use crate::notifier::{LifecycleEvent, Notifier, NotifyError};

    fn created() -> LifecycleEvent {
        LifecycleEvent::Created {
            delivery_id: Uuid::new_v4(),
            delivery_type: DeliveryType::Standard,
            final_price: 1_000.0,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let event = created();

        notifier.publish(&event.topic(), event.clone()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.delivery_id(), event.delivery_id());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_reports_an_error() {
        let notifier = BroadcastNotifier::new(8);
        let event = created();

        let err = notifier.publish("deliveries.x", event).await.unwrap_err();
        assert!(matches!(err, NotifyError::NoSubscribers(topic) if topic == "deliveries.x"));
    }
}
