use crate::models::OrderStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Domain events raised on the request path and consumed by the notification worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    NewOrder(Uuid),
    OrderStatusUpdated {
        order_id: Uuid,
        new_status: OrderStatus,
    },
    CustomerRegistered(Uuid),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::NewOrder(_) => "new_order",
            Event::OrderStatusUpdated { .. } => "order_status_updated",
            Event::CustomerRegistered(_) => "customer_registered",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Bounded channel pair sized from `event_channel_capacity`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Waits for channel admission only; handling happens on the worker.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumer side of the event channel.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Drains the channel until every sender is dropped. Handler failures are logged and
/// never stop the loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handler: Arc<dyn EventHandler>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let name = event.name();
        debug!(event = name, "Received event: {:?}", event);

        if let Err(e) = handler.handle_event(event).await {
            error!(event = name, error = %e, "Failed to handle event");
        }
    }

    warn!("Event processing loop has ended");
}
