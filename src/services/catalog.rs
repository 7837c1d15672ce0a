//! Catalog collaborator: read-only pricing, stock and gateway handles for
//! purchasable variants.
//!
//! Methods are generic over the connection so callers can read inside their
//! own transaction — the materializer prices cart lines in the same
//! transaction that empties the cart.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    entities::{product_variant, ProductVariant},
    errors::ServiceError,
};

/// A variant as offered for sale right now.
#[derive(Debug, Clone, Serialize)]
pub struct VariantOffer {
    pub variant_id: Uuid,
    pub sku: String,
    pub display_name: String,
    pub unit_price: Decimal,
    pub discounted_price: Decimal,
    pub available_qty: i32,
    pub gateway_price_id: Option<String>,
}

impl From<product_variant::Model> for VariantOffer {
    fn from(model: product_variant::Model) -> Self {
        let discounted_price = model.discounted_price();
        Self {
            variant_id: model.id,
            sku: model.sku,
            display_name: model.display_name,
            unit_price: model.unit_price,
            discounted_price,
            available_qty: model.available_qty,
            gateway_price_id: model.gateway_price_id,
        }
    }
}

pub struct CatalogService;

impl CatalogService {
    pub fn new() -> Self {
        Self
    }

    /// Current offer for a single variant.
    pub async fn offer<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_id: Uuid,
    ) -> Result<Option<VariantOffer>, ServiceError> {
        Ok(ProductVariant::find_by_id(variant_id)
            .one(conn)
            .await?
            .map(VariantOffer::from))
    }

    /// Current offers for a set of variants, keyed by variant id.
    pub async fn offers<C: ConnectionTrait>(
        &self,
        conn: &C,
        variant_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VariantOffer>, ServiceError> {
        if variant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let variants = ProductVariant::find()
            .filter(product_variant::Column::Id.is_in(variant_ids.iter().copied()))
            .all(conn)
            .await?;

        Ok(variants
            .into_iter()
            .map(|v| (v.id, VariantOffer::from(v)))
            .collect())
    }
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new()
    }
}
