use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::entities::OrderStatus;

/// Domain events published by the services. Consumed by the logging
/// processor task; the channel is the seam for future subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartItemAdded {
        cart_item_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved(Uuid),
    CartCleared {
        items_removed: u64,
    },
    CartMerged {
        user_id: Uuid,
        items_merged: u64,
    },
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    CategorySaved(Uuid),
    CategoryDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget variant used on paths where event delivery must not
    /// fail the user-facing operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Dropped event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime of
/// the process; exits when all senders are gone.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event");
    }
    info!("event channel closed, processor exiting");
}
