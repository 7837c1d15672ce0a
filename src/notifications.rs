//! Out-of-band buyer notifications.
//!
//! Settlement hands a finished receipt to the event worker, which delivers
//! it through a [`NotificationSink`]. Delivery is fire-and-forget: failures
//! are logged and never surfaced to the buyer or the gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::entities::address::AddressSnapshot;

/// One receipt line: product name, quantity, frozen line total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_name: String,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Everything the order-confirmation message needs, assembled once at
/// settlement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    pub lines: Vec<ReceiptLine>,
    pub shipping_address: AddressSnapshot,
    pub recipient_email: String,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivery channel for buyer-facing notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, receipt: &OrderReceipt) -> Result<(), NotificationError>;
}

/// Sink that records deliveries in the application log. Stands in for the
/// mail transport, which is owned by another part of the system.
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn deliver(&self, receipt: &OrderReceipt) -> Result<(), NotificationError> {
        info!(
            order_id = %receipt.order_id,
            recipient = %receipt.recipient_email,
            total = %receipt.total,
            lines = receipt.lines.len(),
            "Order confirmation queued for delivery"
        );
        Ok(())
    }
}
