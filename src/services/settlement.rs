//! Settlement reconciler: applies asynchronous gateway events to
//! payment/order state.
//!
//! Gateway delivery is at-least-once and unordered, so every handler here
//! is an idempotent no-op for anything it has already applied: an unknown
//! session id is accepted, a second `completed` for a settled payment is
//! accepted without a second notification, and unrecognized event types
//! are ignored. Returning an error would only make the gateway retry.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};

use crate::{
    entities::{
        address::AddressSnapshot, order, order_line, payment, Identity, Order, OrderLine, Payment,
        ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{OrderReceipt, ReceiptLine},
};

pub const EVENT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SESSION_EXPIRED: &str = "checkout.session.expired";

pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SettlementService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Applies one verified gateway event. Unknown event types are accepted
    /// and ignored.
    #[instrument(skip(self))]
    pub async fn handle_event(
        &self,
        event_type: &str,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        match event_type {
            EVENT_SESSION_COMPLETED => self.handle_completed(session_id).await,
            EVENT_SESSION_EXPIRED => self.handle_expired(session_id).await,
            other => {
                info!(event_type = other, "Ignoring unhandled gateway event");
                Ok(())
            }
        }
    }

    /// Marks the payment settled and the order paid, then queues the order
    /// confirmation. The settled flag doubles as the idempotency marker:
    /// the update is a compare-and-set on `settled = false`, so a duplicate
    /// delivery (sequential or concurrent) performs no transition and sends
    /// no second notification.
    async fn handle_completed(&self, session_id: &str) -> Result<(), ServiceError> {
        let payment = match self.find_by_session(session_id).await? {
            Some(p) => p,
            None => {
                warn!(%session_id, "Completed event for unknown session, ignoring");
                return Ok(());
            }
        };

        if payment.settled {
            info!(order_id = %payment.order_id, "Payment already settled, ignoring duplicate");
            return Ok(());
        }

        let txn = self.db.begin().await?;

        let updated = Payment::update_many()
            .col_expr(payment::Column::Settled, Expr::value(true))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payment::Column::Id.eq(payment.id))
            .filter(payment::Column::Settled.eq(false))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            // Another delivery won the race; nothing left to do.
            txn.rollback().await?;
            return Ok(());
        }

        let order = Order::find_by_id(payment.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("payment {} has no order", payment.id))
            })?;

        if order.status == order::OrderStatus::New {
            let mut update: order::ActiveModel = order.clone().into();
            update.status = Set(order::OrderStatus::Paid);
            update.update(&txn).await?;
        }

        txn.commit().await?;

        info!(order_id = %order.id, "Payment settled, order marked paid");

        // Notification is fire-and-forget: the transition is committed, so
        // a receipt failure must not fail the webhook.
        match self.build_receipt(&order).await {
            Ok(receipt) => {
                self.event_sender
                    .send_or_log(Event::PaymentSettled {
                        order_id: order.id,
                        receipt,
                    })
                    .await;
            }
            Err(e) => {
                error!(order_id = %order.id, "Failed to assemble order receipt: {}", e);
            }
        }

        Ok(())
    }

    /// Clears the session id so a fresh session can be opened. Settled
    /// payments and unknown sessions are left untouched.
    async fn handle_expired(&self, session_id: &str) -> Result<(), ServiceError> {
        let payment = match self.find_by_session(session_id).await? {
            Some(p) => p,
            None => {
                warn!(%session_id, "Expired event for unknown session, ignoring");
                return Ok(());
            }
        };

        if payment.settled {
            return Ok(());
        }

        let order_id = payment.order_id;
        let mut update: payment::ActiveModel = payment.into();
        update.gateway_session_id = Set(None);
        update.updated_at = Set(Utc::now());
        update.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionExpired { order_id })
            .await;

        info!(%order_id, "Expired session cleared");
        Ok(())
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::GatewaySessionId.eq(session_id))
            .one(&*self.db)
            .await?)
    }

    /// Assembles the confirmation payload: order, named line items, the
    /// shipping snapshot and the owner's contact address.
    async fn build_receipt(&self, order: &order::Model) -> Result<OrderReceipt, ServiceError> {
        let owner = Identity::find_by_id(order.identity_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("order {} has no owner row", order.id))
            })?;

        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order.id))
            .find_also_related(ProductVariant)
            .all(&*self.db)
            .await?;

        let shipping_address: AddressSnapshot = serde_json::from_str(&order.shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("address snapshot: {}", e)))?;

        Ok(OrderReceipt {
            order_id: order.id,
            created_at: order.created_at,
            total: order.total_amount,
            lines: lines
                .into_iter()
                .map(|(line, variant)| ReceiptLine {
                    product_name: variant
                        .map(|v| v.display_name)
                        .unwrap_or_else(|| "(unavailable)".to_string()),
                    quantity: line.quantity,
                    line_total: line.line_total(),
                })
                .collect(),
            shipping_address,
            recipient_email: owner.email,
        })
    }
}
