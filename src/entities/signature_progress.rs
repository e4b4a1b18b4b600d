//! Signature progress entity - Completion of one sign-off step in one period.
//!
//! A missing row means the step is not completed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Step completion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "signature_progress")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Period row this completion belongs to
    pub monthly_progress_id: i64,
    /// Sign-off step being completed
    pub signature_id: i64,
    /// Whether the step is done
    pub is_completed: bool,
    /// When the step was marked done
    pub completed_at: Option<DateTimeUtc>,
}

/// Defines relationships between `SignatureProgress` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each completion belongs to one period row
    #[sea_orm(
        belongs_to = "super::monthly_progress::Entity",
        from = "Column::MonthlyProgressId",
        to = "super::monthly_progress::Column::Id",
        on_delete = "Cascade"
    )]
    MonthlyProgress,
    /// Each completion refers to one sign-off step
    #[sea_orm(
        belongs_to = "super::signature::Entity",
        from = "Column::SignatureId",
        to = "super::signature::Column::Id",
        on_delete = "Cascade"
    )]
    Signature,
}

impl Related<super::monthly_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyProgress.def()
    }
}

impl Related<super::signature::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Signature.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
