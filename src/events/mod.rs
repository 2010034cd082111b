//! Domain events emitted by the services.
//!
//! Delivery is best-effort: services log and continue when the channel is
//! closed, so event wiring never affects the outcome of an operation.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::entities::OrderStatus;

/// Events that can occur in the fulfillment core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentRedirectIssued {
        order_id: Uuid,
    },
    PaymentCallbackProcessed {
        order_id: Uuid,
        accepted: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and the sender half wrapped for services.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sender, mut receiver) = EventSender::channel(8);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        sender.send(Event::OrderCancelled(order_id)).await.unwrap();

        assert!(matches!(receiver.recv().await, Some(Event::OrderCreated(id)) if id == order_id));
        assert!(matches!(receiver.recv().await, Some(Event::OrderCancelled(id)) if id == order_id));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_is_gone() {
        let (sender, receiver) = EventSender::channel(1);
        drop(receiver);

        let result = sender.send(Event::OrderCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
