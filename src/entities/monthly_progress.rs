//! Monthly progress entity - One reporting period of a contract.
//!
//! Rows are keyed by (`contract_id`, `year`, `month`, `sub_period`).
//! `sub_period` is 1 for standard cadences and 1 or 2 for the half-month
//! cadence. Rows written before the half-month cadence existed carry `NULL`,
//! which reads as 1.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Period progress database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_progress")]
pub struct Model {
    /// Unique identifier for the period row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contract this period belongs to
    pub contract_id: i64,
    /// Calendar month, 1-12
    pub month: i32,
    /// Year of the period
    pub year: i32,
    /// Half of the month (1 or 2), `None` for legacy rows
    pub sub_period: Option<i32>,
    /// Link to the uploaded document
    pub upload_link: Option<String>,
    /// Whether the upload step is done
    pub is_upload_completed: bool,
    /// Free-text notes for the period
    pub notes: Option<String>,
    /// When `notes` was last edited
    pub notes_updated_at: Option<DateTimeUtc>,
    /// When the row was last written
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `MonthlyProgress` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each period belongs to one contract
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id",
        on_delete = "Cascade"
    )]
    Contract,
    /// One period has one completion row per sign-off step
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
