//! Domain event publishing over NATS.

use crate::domain::events::DomainEvent;

/// Publishes domain events when a NATS connection is configured. Without one,
/// events are only logged at debug level.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connect to `url`. A failed connection disables publishing instead of
    /// failing startup.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url = %url, "Connected to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "NATS unavailable, events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(nats) = &self.nats else {
            tracing::debug!(subject = event.subject(), "Event not published, NATS disabled");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(subject = event.subject(), error = %e, "Failed to serialize event");
                return;
            }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "Failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events {
            self.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use crate::domain::value_objects::OrderState;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_disabled_publisher_is_a_no_op() {
        let publisher = EventPublisher::connect(None).await;
        assert!(!publisher.is_enabled());
        publisher.publish_all(vec![DomainEvent::Order(OrderEvent::StateChanged {
            order_id: Uuid::new_v4(), reference: "ref".into(), from: OrderState::Unpaid, to: OrderState::Paid,
        })]).await;
    }
}
