use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::DomainEvent;

/// Fire-and-forget fan-out of domain events.
///
/// `emit` never blocks and never fails: with no subscribers the event is
/// dropped, and a subscriber that falls more than the buffer size behind
/// loses the oldest events.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: DomainEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => debug!("Event {} delivered to {} subscriber(s)", name, receivers),
            Err(_) => debug!("Event {} dropped, no subscribers", name),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Logs every event as JSON until the channel closes.
    pub fn spawn_logger(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => info!(recipient = %event.recipient(), "event {}", json),
                        Err(e) => warn!("Failed to serialize event {}: {}", event.name(), e),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event logger lagged behind by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use uuid::Uuid;

    fn created() -> DomainEvent {
        DomainEvent::InvestmentCreated {
            investment_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: BigDecimal::from(100),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let emitter = EventEmitter::new(4);
        emitter.emit(created());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let emitter = EventEmitter::new(4);
        let mut rx = emitter.subscribe();
        emitter.emit(created());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "investment_created");
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let emitter = EventEmitter::new(2);
        let mut rx = emitter.subscribe();
        for _ in 0..5 {
            emitter.emit(created());
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
