//! Area entity - A service area of a customer (e.g. a region or site).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Area database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "areas")]
pub struct Model {
    /// Unique identifier for the area
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer this area belongs to
    pub customer_id: i64,
    /// Human-readable name of the area
    pub name: String,
    /// Short code shown on the dashboard
    pub code: String,
}

/// Defines relationships between Area and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each area belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    /// One area has many contracts
    #[sea_orm(has_many = "super::contract::Entity")]
    Contracts,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contracts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
