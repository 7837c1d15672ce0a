//! Order materialization and the scoped order read path.
//!
//! Materialization is the only place prices are computed: the cart is read,
//! line prices frozen, the order + lines + payment inserted and the cart
//! emptied, all inside one transaction. Nothing downstream ever recomputes
//! a price, so the buyer is charged exactly what they saw.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        address::{self, AddressSnapshot},
        cart, cart_item, identity, order, order_line, payment, Cart, CartItem, Order, OrderLine,
        Payment, ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::CatalogService,
        identities::{CheckoutContact, IdentityService},
    },
};

/// Checkout payload, resolved once at the API boundary. Users reference an
/// address from their book; guests enter contact details and a new address.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutRequest {
    User(UserCheckout),
    Guest(GuestCheckout),
}

#[derive(Debug, Deserialize)]
pub struct UserCheckout {
    pub shipping_address_id: Uuid,
    pub shipping_method: order::ShippingMethod,
    pub payment_method: order::PaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GuestCheckout {
    #[validate(email)]
    pub email: String,
    #[validate]
    pub shipping_address: NewShippingAddress,
    pub shipping_method: order::ShippingMethod,
    pub payment_method: order::PaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewShippingAddress {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(length(min = 1))]
    pub street: String,
    pub unit_number: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub country: String,
    pub phone_number: Option<String>,
}

/// A freshly materialized order with its payment row.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub total_amount: Decimal,
    pub status: order::OrderStatus,
    pub created_at: DateTime<Utc>,
    pub payment: PaymentState,
}

#[derive(Debug, Serialize)]
pub struct PaymentState {
    pub settled: bool,
    pub session_open: bool,
}

impl From<&payment::Model> for PaymentState {
    fn from(p: &payment::Model) -> Self {
        Self {
            settled: p.settled,
            session_open: p.has_open_session(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub total_amount: Decimal,
    pub status: order::OrderStatus,
    pub created_at: DateTime<Utc>,
    pub payment: Option<PaymentState>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineDetail {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub display_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub total_amount: Decimal,
    pub status: order::OrderStatus,
    pub shipping_address: AddressSnapshot,
    pub shipping_method: order::ShippingMethod,
    pub payment_method: order::PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub payment: Option<PaymentState>,
    pub lines: Vec<OrderLineDetail>,
}

/// Finds an order visible to the caller: its owner, or the guest identity
/// recorded at checkout. Everyone else sees nothing.
pub(crate) async fn find_order_scoped<C: ConnectionTrait>(
    conn: &C,
    caller_id: Uuid,
    order_id: Uuid,
) -> Result<Option<order::Model>, ServiceError> {
    Ok(Order::find_by_id(order_id)
        .filter(
            Condition::any()
                .add(order::Column::IdentityId.eq(caller_id))
                .add(order::Column::GuestIdentityId.eq(caller_id)),
        )
        .one(conn)
        .await?)
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
    identities: Arc<IdentityService>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<CatalogService>,
        identities: Arc<IdentityService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            catalog,
            identities,
            event_sender,
        }
    }

    /// Materializes the caller's cart into an order.
    ///
    /// Inside one transaction: cart lines are read and priced, the order is
    /// created with total = Σ(frozen price × quantity), one order line per
    /// cart line is inserted, the cart is emptied and the payment row is
    /// created. An empty cart fails before any write. Stock is checked but
    /// not reserved, so the guard is best-effort under concurrent
    /// checkouts. Guest promotion runs only after the transaction commits.
    #[instrument(skip(self, caller, request), fields(caller = %caller.id))]
    pub async fn place_order(
        &self,
        caller: &identity::Model,
        request: CheckoutRequest,
    ) -> Result<PlacedOrder, ServiceError> {
        let (shipping_method, payment_method, contact) = match &request {
            CheckoutRequest::User(user) => (user.shipping_method, user.payment_method, None),
            CheckoutRequest::Guest(guest) => {
                guest.validate()?;
                (
                    guest.shipping_method,
                    guest.payment_method,
                    Some(CheckoutContact {
                        email: guest.email.clone(),
                        first_name: guest.shipping_address.first_name.clone(),
                        last_name: guest.shipping_address.last_name.clone(),
                    }),
                )
            }
        };

        let resolution = self
            .identities
            .resolve_checkout(caller, contact.as_ref())
            .await?;

        let txn = self.db.begin().await?;

        // Cart snapshot, read in the same transaction that empties it.
        let cart = Cart::find()
            .filter(cart::Column::IdentityId.eq(caller.id))
            .one(&txn)
            .await?;
        let items = match &cart {
            Some(cart) => {
                CartItem::find()
                    .filter(cart_item::Column::CartId.eq(cart.id))
                    .all(&txn)
                    .await?
            }
            None => Vec::new(),
        };
        if items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let cart = cart.expect("cart exists when it has items");

        let variant_ids: Vec<Uuid> = items.iter().map(|i| i.variant_id).collect();
        let offers = self.catalog.offers(&txn, &variant_ids).await?;

        // Soft stock guard: no reservation is taken, so concurrent
        // checkouts can still oversell the last unit.
        let mut frozen: Vec<(Uuid, i32, Decimal)> = Vec::with_capacity(items.len());
        for item in &items {
            let offer = offers.get(&item.variant_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Variant {} is no longer available",
                    item.variant_id
                ))
            })?;
            if item.quantity > offer.available_qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "Variant {}: requested {}, {} in stock",
                    item.variant_id, item.quantity, offer.available_qty
                )));
            }
            frozen.push((item.variant_id, item.quantity, offer.discounted_price));
        }

        let total: Decimal = frozen
            .iter()
            .map(|(_, qty, price)| *price * Decimal::from(*qty))
            .sum();

        let snapshot = match &request {
            CheckoutRequest::User(user) => {
                let row = address::Entity::find_by_id(user.shipping_address_id)
                    .filter(address::Column::IdentityId.eq(caller.id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Address {} not found",
                            user.shipping_address_id
                        ))
                    })?;
                AddressSnapshot::from(row)
            }
            CheckoutRequest::Guest(guest) => {
                let row = address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    identity_id: Set(resolution.owner_id),
                    first_name: Set(guest.shipping_address.first_name.clone()),
                    last_name: Set(guest.shipping_address.last_name.clone()),
                    region: Set(guest.shipping_address.region.clone()),
                    street: Set(guest.shipping_address.street.clone()),
                    unit_number: Set(guest.shipping_address.unit_number.clone()),
                    city: Set(guest.shipping_address.city.clone()),
                    country: Set(guest.shipping_address.country.clone()),
                    phone_number: Set(guest.shipping_address.phone_number.clone()),
                }
                .insert(&txn)
                .await?;
                AddressSnapshot::from(row)
            }
        };

        let shipping_json = serde_json::to_string(&snapshot)
            .map_err(|e| ServiceError::InternalError(format!("address snapshot: {}", e)))?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let placed = order::ActiveModel {
            id: Set(order_id),
            identity_id: Set(resolution.owner_id),
            guest_identity_id: Set(resolution.guest_ref),
            shipping_address: Set(shipping_json),
            shipping_method: Set(shipping_method),
            payment_method: Set(payment_method),
            total_amount: Set(total),
            status: Set(order::OrderStatus::New),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (variant_id, quantity, unit_price) in &frozen {
            order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                variant_id: Set(*variant_id),
                quantity: Set(*quantity),
                unit_price: Set(*unit_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let payment_row = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            settled: Set(false),
            gateway_session_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        if let Some(contact) = &resolution.promotion {
            self.identities.promote_guest(caller.id, contact).await?;
        }

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                identity_id: resolution.owner_id,
            })
            .await;

        info!(%order_id, total = %placed.total_amount, "Order materialized from cart");

        Ok(PlacedOrder {
            id: placed.id,
            total_amount: placed.total_amount,
            status: placed.status,
            created_at: placed.created_at,
            payment: PaymentState::from(&payment_row),
        })
    }

    /// All orders owned by the caller, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, caller_id: Uuid) -> Result<Vec<OrderSummary>, ServiceError> {
        let rows = Order::find()
            .filter(order::Column::IdentityId.eq(caller_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_also_related(Payment)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(o, p)| OrderSummary {
                id: o.id,
                total_amount: o.total_amount,
                status: o.status,
                created_at: o.created_at,
                payment: p.as_ref().map(PaymentState::from),
            })
            .collect())
    }

    /// One order, visible to its owner or its recorded guest. Any other
    /// caller gets NotFound so the id's existence is never confirmed.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = find_order_scoped(&*self.db, caller_id, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let payment = Payment::find()
            .filter(payment::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?;

        let lines = OrderLine::find()
            .filter(order_line::Column::OrderId.eq(order.id))
            .find_also_related(ProductVariant)
            .all(&*self.db)
            .await?;

        let shipping_address: AddressSnapshot = serde_json::from_str(&order.shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("address snapshot: {}", e)))?;

        Ok(OrderDetail {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            shipping_address,
            shipping_method: order.shipping_method,
            payment_method: order.payment_method,
            created_at: order.created_at,
            payment: payment.as_ref().map(PaymentState::from),
            lines: lines
                .into_iter()
                .map(|(line, variant)| OrderLineDetail {
                    id: line.id,
                    variant_id: line.variant_id,
                    display_name: variant.as_ref().map(|v| v.display_name.clone()),
                    sku: variant.map(|v| v.sku),
                    quantity: line.quantity,
                    line_total: line.line_total(),
                    unit_price: line.unit_price,
                })
                .collect(),
        })
    }
}
