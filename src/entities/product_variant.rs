use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog read model for a purchasable variant. The order engine only
/// reads this table: price, discount and stock are maintained by the
/// catalog side of the system.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sku: String,
    pub display_name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    /// Percentage discount currently applied, 1..=100.
    #[sea_orm(nullable)]
    pub discount_percent: Option<i32>,
    pub available_qty: i32,
    /// Gateway-side price handle used to build checkout line items.
    #[sea_orm(nullable)]
    pub gateway_price_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLines,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unit price with the current discount applied. This is the price that
    /// gets frozen onto order lines at materialization.
    pub fn discounted_price(&self) -> Decimal {
        match self.discount_percent {
            Some(pct) if (1..=100).contains(&pct) => {
                self.unit_price * (Decimal::from(100 - pct) / Decimal::from(100))
            }
            _ => self.unit_price,
        }
    }
}
