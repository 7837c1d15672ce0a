use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address book row. Users pick one of their stored addresses at checkout;
/// guests enter a new one, which is stored here before being snapshotted
/// onto the order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub identity_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub region: String,
    pub street: String,
    #[sea_orm(nullable)]
    pub unit_number: Option<String>,
    pub city: String,
    pub country: String,
    #[sea_orm(nullable)]
    pub phone_number: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::identity::Entity",
        from = "Column::IdentityId",
        to = "super::identity::Column::Id"
    )]
    Identity,
}

impl Related<super::identity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Identity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Shipping destination as frozen onto an order at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub region: String,
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<String>,
    pub city: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl From<Model> for AddressSnapshot {
    fn from(model: Model) -> Self {
        Self {
            first_name: model.first_name,
            last_name: model.last_name,
            region: model.region,
            street: model.street,
            unit_number: model.unit_number,
            city: model.city,
            country: model.country,
            phone_number: model.phone_number,
        }
    }
}
