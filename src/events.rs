//! Application events and the background worker that drains them.
//!
//! Core operations publish events after their transactions commit; the
//! worker runs on its own task so request handlers (and above all the
//! payment webhook) never wait on downstream delivery.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::notifications::{NotificationSink, OrderReceipt};

/// Events emitted by the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        identity_id: Uuid,
    },
    CheckoutSessionOpened {
        order_id: Uuid,
        session_id: String,
    },
    CheckoutSessionExpired {
        order_id: Uuid,
    },
    PaymentSettled {
        order_id: Uuid,
        receipt: OrderReceipt,
    },
    GuestPromoted {
        identity_id: Uuid,
        email: String,
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

    /// Sends an event, logging instead of failing when the worker is gone.
    /// Event delivery is best-effort by design; the database is the source
    /// of truth for every state transition.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            error!("Failed to enqueue event: {}", e);
        }
    }
}

/// Drains the event channel. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, sink: Arc<dyn NotificationSink>) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::PaymentSettled { order_id, receipt } => {
                if let Err(e) = sink.deliver(&receipt).await {
                    error!(%order_id, "Order confirmation delivery failed: {}", e);
                }
            }
            Event::GuestPromoted { identity_id, email } => {
                info!(%identity_id, %email, "Guest promoted to permanent account");
            }
            Event::OrderPlaced { order_id, identity_id } => {
                info!(%order_id, %identity_id, "Order placed");
            }
            Event::CheckoutSessionOpened { order_id, session_id } => {
                info!(%order_id, %session_id, "Checkout session opened");
            }
            Event::CheckoutSessionExpired { order_id } => {
                info!(%order_id, "Checkout session expired");
            }
        }
    }
}
