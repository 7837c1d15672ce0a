//! Payment session manager.
//!
//! Per payment the session state machine is: no session → session open →
//! settled, where "open → no session" happens only when the gateway reports
//! the session expired, and settled is terminal. The gateway call is made
//! with no database transaction or row lock held; nothing local mutates
//! until the gateway has produced a session, so a failed call is always
//! safe to retry.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{order_line, payment, OrderLine, Payment},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{CheckoutLineItem, PaymentGateway, SessionStatus},
    services::{catalog::CatalogService, orders::find_order_scoped},
};

/// An open checkout session as returned to the buyer.
#[derive(Debug, Serialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub url: String,
}

pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    success_url: String,
    cancel_url: String,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<CatalogService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            db,
            catalog,
            gateway,
            event_sender,
            success_url,
            cancel_url,
        }
    }

    /// Loads the payment for an order the caller is allowed to see.
    async fn payment_for_caller(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
    ) -> Result<payment::Model, ServiceError> {
        let order = find_order_scoped(&*self.db, caller_id, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        Payment::find()
            .filter(payment::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("order {} has no payment row", order.id))
            })
    }

    /// Builds gateway line items from the order's lines: the catalog's
    /// gateway price handle plus the ordered quantity. The gateway is the
    /// source of truth for the charged amount, so the frozen line price is
    /// deliberately not sent; a catalog price change between materialization
    /// and session creation can make the two diverge.
    async fn build_line_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<CheckoutLineItem>, ServiceError> {
        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "No order items available".into(),
            ));
        }

        let variant_ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();
        let offers = self.catalog.offers(&*self.db, &variant_ids).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let price = offers
                .get(&line.variant_id)
                .and_then(|o| o.gateway_price_id.clone())
                .ok_or_else(|| {
                    ServiceError::ExternalServiceError(format!(
                        "variant {} has no gateway price handle",
                        line.variant_id
                    ))
                })?;
            items.push(CheckoutLineItem {
                price,
                quantity: line.quantity as i64,
            });
        }

        Ok(items)
    }

    /// Opens a checkout session for an unpaid order.
    #[instrument(skip(self))]
    pub async fn open_session(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
    ) -> Result<SessionHandle, ServiceError> {
        let payment = self.payment_for_caller(caller_id, order_id).await?;

        if payment.settled {
            return Err(ServiceError::AlreadySettled);
        }
        if payment.has_open_session() {
            return Err(ServiceError::SessionAlreadyOpen);
        }

        let line_items = self.build_line_items(order_id).await?;

        // Blocking network call; made before any local write so a gateway
        // failure leaves nothing to undo.
        let session = self
            .gateway
            .create_session(line_items, &self.success_url, &self.cancel_url)
            .await?;

        let mut update: payment::ActiveModel = payment.into();
        update.gateway_session_id = Set(Some(session.id.clone()));
        update.updated_at = Set(Utc::now());
        update.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CheckoutSessionOpened {
                order_id,
                session_id: session.id.clone(),
            })
            .await;

        info!(%order_id, session_id = %session.id, "Checkout session opened");

        Ok(SessionHandle {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Re-fetches the open session so a reloaded checkout page does not
    /// open a duplicate. Reports expiry and returns the payment to the
    /// no-session state so a fresh session can be opened.
    #[instrument(skip(self))]
    pub async fn get_session(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
    ) -> Result<SessionHandle, ServiceError> {
        let payment = self.payment_for_caller(caller_id, order_id).await?;

        if payment.settled {
            return Err(ServiceError::AlreadySettled);
        }
        let session_id = match payment.gateway_session_id.clone() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ServiceError::NoOpenSession),
        };

        let session = self.gateway.retrieve_session(&session_id).await?;

        if session.status == SessionStatus::Expired {
            let mut update: payment::ActiveModel = payment.into();
            update.gateway_session_id = Set(None);
            update.updated_at = Set(Utc::now());
            update.update(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::CheckoutSessionExpired { order_id })
                .await;

            return Err(ServiceError::SessionExpired);
        }

        Ok(SessionHandle {
            session_id: session.id,
            url: session.url.unwrap_or_default(),
        })
    }
}
