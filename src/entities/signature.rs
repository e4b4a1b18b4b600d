//! Signature entity - One sign-off step of a contract's roster.
//!
//! `order` is a dense 1-based rank within the contract.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sign-off step database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "signatures")]
pub struct Model {
    /// Unique identifier for the step
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contract this step belongs to
    pub contract_id: i64,
    /// Name of the signer
    pub name: String,
    /// Role or position of the signer
    pub role: String,
    /// 1-based rank within the contract
    pub order: i32,
}

/// Defines relationships between Signature and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each step belongs to one contract
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id",
        on_delete = "Cascade"
    )]
    Contract,
    /// One step has completion rows in many periods
    #[sea_orm(has_many = "super::signature_progress::Entity")]
    SignatureProgress,
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

impl Related<super::signature_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SignatureProgress.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
