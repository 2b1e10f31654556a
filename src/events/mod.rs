use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentMethod};

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

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Domain writes have already happened by the time events are emitted.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events raised by the order and payment flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
    },
    CartCleared {
        user_id: Uuid,
    },
    PaymentConfirmed {
        order_id: Uuid,
        source: PaymentSource,
    },
    DeliveryAssigned {
        order_id: Uuid,
        delivery_person_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
}

/// Who flipped the payment flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum PaymentSource {
    #[strum(serialize = "gateway")]
    Gateway,
    #[strum(serialize = "admin")]
    Admin,
    #[strum(serialize = "completion")]
    Completion,
}

/// Creates the event channel used by the services and its consumer
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes events until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderPlaced {
                order_id,
                user_id,
                amount,
                payment_method,
            } => {
                info!(%order_id, %user_id, %amount, %payment_method, "order placed");
            }
            Event::CartCleared { user_id } => {
                info!(%user_id, "cart cleared");
            }
            Event::PaymentConfirmed { order_id, source } => {
                info!(%order_id, %source, "payment confirmed");
            }
            Event::DeliveryAssigned {
                order_id,
                delivery_person_id,
            } => {
                info!(%order_id, %delivery_person_id, "delivery assigned");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
        }
    }

    info!("Event processing loop stopped");
}
