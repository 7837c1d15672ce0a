//! Shopping cart service.
//!
//! Carts are mutable staging areas: one per identity, holding variant +
//! quantity pairs. Prices are never stored on cart lines; every read joins
//! the catalog's current discounted price, so the cart always shows what
//! the buyer would be charged if they checked out now.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{cart, cart_item, Cart, CartItem},
    errors::ServiceError,
    services::catalog::CatalogService,
};

/// A cart line joined with its current catalog offer.
#[derive(Debug, Clone, Serialize)]
pub struct PricedCartLine {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub display_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discounted_unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, catalog: Arc<CatalogService>) -> Self {
        Self { db, catalog }
    }

    /// Returns the identity's cart, creating it when absent. Identities
    /// minted by this service always have one; rows seeded by other parts
    /// of the system may not yet.
    pub async fn ensure_cart(&self, identity_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::IdentityId.eq(identity_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            identity_id: Set(identity_id),
            created_at: Set(Utc::now()),
        };

        Ok(cart.insert(&*self.db).await?)
    }

    /// Lists the cart's lines with current pricing.
    #[instrument(skip(self))]
    pub async fn list(&self, identity_id: Uuid) -> Result<Vec<PricedCartLine>, ServiceError> {
        let cart = self.ensure_cart(identity_id).await?;
        let items = cart.find_related(CartItem).all(&*self.db).await?;

        let variant_ids: Vec<Uuid> = items.iter().map(|i| i.variant_id).collect();
        let offers = self.catalog.offers(&*self.db, &variant_ids).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let offer = offers.get(&item.variant_id).ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart references unknown variant {}",
                    item.variant_id
                ))
            })?;
            lines.push(PricedCartLine {
                id: item.id,
                variant_id: item.variant_id,
                display_name: offer.display_name.clone(),
                quantity: item.quantity,
                unit_price: offer.unit_price,
                discounted_unit_price: offer.discounted_price,
                line_total: offer.discounted_price * Decimal::from(item.quantity),
            });
        }

        Ok(lines)
    }

    /// Adds a variant to the cart. Adding a variant that is already in the
    /// cart merges quantities. The merged quantity clamps to the stock on
    /// hand; a clamp all the way to zero is rejected as out of stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        identity_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let cart = self.ensure_cart(identity_id).await?;

        let offer = self
            .catalog
            .offer(&*self.db, variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::VariantId.eq(variant_id))
            .one(&*self.db)
            .await?;

        let requested = quantity + existing.as_ref().map(|i| i.quantity).unwrap_or(0);
        let clamped = requested.min(offer.available_qty);

        if clamped <= 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Variant {} is out of stock",
                variant_id
            )));
        }

        match existing {
            Some(item) => {
                let mut update: cart_item::ActiveModel = item.into();
                update.quantity = Set(clamped);
                Ok(update.update(&*self.db).await?)
            }
            None => {
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    variant_id: Set(variant_id),
                    quantity: Set(clamped),
                };
                Ok(item.insert(&*self.db).await?)
            }
        }
    }

    /// Replaces a line's quantity, clamped to stock on hand.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        identity_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let cart = self.ensure_cart(identity_id).await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let offer = self
            .catalog
            .offer(&*self.db, item.variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {} not found", item.variant_id))
            })?;

        let clamped = quantity.min(offer.available_qty);
        if clamped <= 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Variant {} is out of stock",
                item.variant_id
            )));
        }

        let mut update: cart_item::ActiveModel = item.into();
        update.quantity = Set(clamped);
        Ok(update.update(&*self.db).await?)
    }

    /// Removes a line from the caller's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, identity_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let cart = self.ensure_cart(identity_id).await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        item.delete(&*self.db).await?;
        Ok(())
    }
}
