//! Contract entity - A BAPP contract for one customer and area in one year.
//!
//! The `period` column holds the cadence label (e.g. `"Per 3 Bulan"`); see
//! [`crate::core::period::Cadence`] for how it is interpreted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Contract database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bapp_contracts")]
pub struct Model {
    /// Unique identifier for the contract
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer the contract is delivered to
    pub customer_id: i64,
    /// Area the contract covers
    pub area_id: i64,
    /// Contract name
    pub name: String,
    /// Cadence label, `"Per {n} Bulan"` or `"Per 1/2 Bulan"`
    pub period: String,
    /// Invoice type label
    pub invoice_type: String,
    /// Free-text notes
    pub notes: Option<String>,
    /// Year the contract is tracked in
    pub year: i32,
}

/// Defines relationships between Contract and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each contract belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    /// Each contract belongs to one area
    #[sea_orm(
        belongs_to = "super::area::Entity",
        from = "Column::AreaId",
        to = "super::area::Column::Id",
        on_delete = "Cascade"
    )]
    Area,
    /// One contract has many sign-off steps
    #[sea_orm(has_many = "super::signature::Entity")]
    Signatures,
    /// One contract has many period progress rows
    #[sea_orm(has_many = "super::monthly_progress::Entity")]
    MonthlyProgress,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::area::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Area.def()
    }
}

impl Related<super::signature::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Signatures.def()
    }
}

impl Related<super::monthly_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyProgress.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
