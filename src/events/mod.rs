use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::PaymentStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the processor is gone.
    /// The state change that produced the event has already happened.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

// Things that happened to a basket, an order or a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    BasketItemAdded {
        user_id: i32,
        product_id: i32,
        quantity: u32,
    },
    BasketItemRemoved {
        user_id: i32,
        product_id: i32,
        quantity: u32,
    },
    BasketItemUpdated {
        user_id: i32,
        product_id: i32,
        old_quantity: u32,
        new_quantity: u32,
    },
    BasketCleared {
        user_id: i32,
    },
    DiscountApplied {
        user_id: i32,
        code: String,
        pay_amount: Decimal,
    },
    AddressSubmitted {
        user_id: i32,
        address_id: i32,
    },
    OrderCreated {
        order_id: i32,
        user_id: i32,
        total_price: Decimal,
        created_at: DateTime<Utc>,
    },
    PaymentRecorded {
        user: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
        total_price: Decimal,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::BasketItemAdded { .. } => "basket_item_added",
            Event::BasketItemRemoved { .. } => "basket_item_removed",
            Event::BasketItemUpdated { .. } => "basket_item_updated",
            Event::BasketCleared { .. } => "basket_cleared",
            Event::DiscountApplied { .. } => "discount_applied",
            Event::AddressSubmitted { .. } => "address_submitted",
            Event::OrderCreated { .. } => "order_created",
            Event::PaymentRecorded { .. } => "payment_recorded",
        }
    }
}

// Drains the channel until every sender is dropped, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("storefront.events.processed", 1, "event" => event.name());
        match &event {
            Event::OrderCreated {
                order_id,
                user_id,
                total_price,
                ..
            } => {
                info!(order_id, user_id, %total_price, "Order created");
            }
            Event::PaymentRecorded {
                user,
                payment_id,
                status,
                ..
            } => {
                if *status == PaymentStatus::Fail {
                    warn!(%user, %payment_id, "Payment attempt failed");
                } else {
                    info!(%user, %payment_id, "Payment recorded");
                }
            }
            other => {
                info!(event = other.name(), payload = ?other, "Basket event");
            }
        }
    }

    info!("Event processing loop stopped");
}
