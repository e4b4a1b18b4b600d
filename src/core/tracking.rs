//! Single-period writes: ticking off sign-off steps, recording the upload and
//! editing notes.
//!
//! Every write goes through [`get_or_create_period_row`], so a period row
//! exists as soon as anything is recorded for it. The row-level helpers at the
//! bottom are shared with the migration engine.

use crate::{
    core::period::{MONTHS, normalize_sub_period},
    entities::{
        MonthlyProgress, Signature, SignatureProgress, monthly_progress, signature,
        signature_progress,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};

/// Identifies one period slot of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    /// Contract the period belongs to
    pub contract_id: i64,
    /// Year
    pub year: i32,
    /// Calendar month, 1-12
    pub month: i32,
    /// 1, or 2 for the second half of a half-month period
    pub sub_period: i32,
}

impl PeriodKey {
    /// Key of a whole-month period (sub-period 1).
    #[must_use]
    pub const fn month(contract_id: i64, year: i32, month: i32) -> Self {
        Self {
            contract_id,
            year,
            month,
            sub_period: 1,
        }
    }

    /// Key of one half of a month.
    #[must_use]
    pub const fn half(contract_id: i64, year: i32, month: i32, sub_period: i32) -> Self {
        Self {
            contract_id,
            year,
            month,
            sub_period,
        }
    }

    fn validate(&self) -> Result<()> {
        if !MONTHS.contains(&self.month) {
            return Err(Error::Validation {
                message: format!("Month {} is outside 1-12", self.month),
            });
        }
        if !(1..=2).contains(&self.sub_period) {
            return Err(Error::Validation {
                message: format!("Sub-period {} is neither 1 nor 2", self.sub_period),
            });
        }
        Ok(())
    }
}

/// Finds the row for `key`, creating an empty one if none exists.
///
/// For sub-period 1 a legacy row without a sub-period also matches; an
/// explicit sub-period 1 row is preferred when both exist.
pub async fn get_or_create_period_row<C>(db: &C, key: PeriodKey) -> Result<monthly_progress::Model>
where
    C: ConnectionTrait,
{
    key.validate()?;

    if let Some(existing) = find_period_row(db, key).await? {
        return Ok(existing);
    }

    let created = monthly_progress::ActiveModel {
        contract_id: Set(key.contract_id),
        month: Set(key.month),
        year: Set(key.year),
        sub_period: Set(Some(key.sub_period)),
        upload_link: Set(None),
        is_upload_completed: Set(false),
        notes: Set(None),
        notes_updated_at: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::debug!(
        "Created period row {} for contract {} {}-{:02}/{}",
        created.id,
        key.contract_id,
        key.year,
        key.month,
        key.sub_period
    );
    Ok(created)
}

/// Finds the row for `key` without creating it.
pub async fn find_period_row<C>(db: &C, key: PeriodKey) -> Result<Option<monthly_progress::Model>>
where
    C: ConnectionTrait,
{
    let candidates = MonthlyProgress::find()
        .filter(monthly_progress::Column::ContractId.eq(key.contract_id))
        .filter(monthly_progress::Column::Year.eq(key.year))
        .filter(monthly_progress::Column::Month.eq(key.month))
        .all(db)
        .await?;

    let mut matching = candidates
        .into_iter()
        .filter(|row| normalize_sub_period(row.sub_period) == key.sub_period);
    let first = matching.next();
    Ok(match first {
        Some(row) if row.sub_period.is_none() => Some(matching.next().unwrap_or(row)),
        other => other,
    })
}

/// Marks one sign-off step of a period as completed or not.
pub async fn set_step_completed(
    db: &DatabaseConnection,
    key: PeriodKey,
    signature_id: i64,
    completed: bool,
) -> Result<signature_progress::Model> {
    let step = Signature::find_by_id(signature_id).one(db).await?;
    if !step.is_some_and(|s: signature::Model| s.contract_id == key.contract_id) {
        return Err(Error::Validation {
            message: format!(
                "Sign-off step {signature_id} does not belong to contract {}",
                key.contract_id
            ),
        });
    }

    let row = get_or_create_period_row(db, key).await?;
    let completed_at = completed.then(Utc::now);

    let existing = SignatureProgress::find()
        .filter(signature_progress::Column::MonthlyProgressId.eq(row.id))
        .filter(signature_progress::Column::SignatureId.eq(signature_id))
        .one(db)
        .await?;

    let saved = if let Some(current) = existing {
        let mut active: signature_progress::ActiveModel = current.into();
        active.is_completed = Set(completed);
        active.completed_at = Set(completed_at);
        active.update(db).await?
    } else {
        signature_progress::ActiveModel {
            monthly_progress_id: Set(row.id),
            signature_id: Set(signature_id),
            is_completed: Set(completed),
            completed_at: Set(completed_at),
            ..Default::default()
        }
        .insert(db)
        .await?
    };

    touch(db, row).await?;
    Ok(saved)
}

/// Records the upload link and whether the upload step is done.
///
/// A blank link is stored as `None`.
pub async fn set_upload(
    db: &DatabaseConnection,
    key: PeriodKey,
    upload_link: Option<String>,
    completed: bool,
) -> Result<monthly_progress::Model> {
    let row = get_or_create_period_row(db, key).await?;
    let link = upload_link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let mut active: monthly_progress::ActiveModel = row.into();
    active.upload_link = Set(link);
    active.is_upload_completed = Set(completed);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Replaces the notes of a period and stamps `notes_updated_at`.
pub async fn update_notes(
    db: &DatabaseConnection,
    key: PeriodKey,
    notes: Option<String>,
) -> Result<monthly_progress::Model> {
    let row = get_or_create_period_row(db, key).await?;
    let notes = notes.filter(|n| !n.trim().is_empty());
    let now = Utc::now();

    let mut active: monthly_progress::ActiveModel = row.into();
    active.notes_updated_at = Set(notes.as_ref().map(|_| now));
    active.notes = Set(notes);
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

async fn touch<C>(db: &C, row: monthly_progress::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut active: monthly_progress::ActiveModel = row.into();
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

/// The data columns of a period row, as copied and cleared by migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowData {
    pub upload_link: Option<String>,
    pub is_upload_completed: bool,
    pub notes: Option<String>,
}

impl RowData {
    pub fn of(row: &monthly_progress::Model) -> Self {
        Self {
            upload_link: row.upload_link.clone(),
            is_upload_completed: row.is_upload_completed,
            notes: row.notes.clone(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.upload_link.is_none() && !self.is_upload_completed && self.notes.is_none()
    }
}

/// Completion state written for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompletionData {
    pub signature_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&signature_progress::Model> for CompletionData {
    fn from(model: &signature_progress::Model) -> Self {
        Self {
            signature_id: model.signature_id,
            is_completed: model.is_completed,
            completed_at: model.completed_at,
        }
    }
}

/// Overwrites the data columns of a row. `notes_updated_at` follows the
/// notes when they change.
pub(crate) async fn write_row_data<C>(
    db: &C,
    row: monthly_progress::Model,
    data: RowData,
) -> Result<monthly_progress::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let notes_changed = row.notes != data.notes;

    let mut active: monthly_progress::ActiveModel = row.into();
    if notes_changed {
        active.notes_updated_at = Set(data.notes.as_ref().map(|_| now));
    }
    active.upload_link = Set(data.upload_link);
    active.is_upload_completed = Set(data.is_upload_completed);
    active.notes = Set(data.notes);
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

/// Deletes every completion of a row and inserts `completions` in their
/// place, so no stale completion survives.
pub(crate) async fn replace_completions<C>(
    db: &C,
    row_id: i64,
    completions: &[CompletionData],
) -> Result<()>
where
    C: ConnectionTrait,
{
    SignatureProgress::delete_many()
        .filter(signature_progress::Column::MonthlyProgressId.eq(row_id))
        .exec(db)
        .await?;

    if completions.is_empty() {
        return Ok(());
    }

    let models = completions.iter().map(|c| signature_progress::ActiveModel {
        monthly_progress_id: Set(row_id),
        signature_id: Set(c.signature_id),
        is_completed: Set(c.is_completed),
        completed_at: Set(c.completed_at),
        ..Default::default()
    });
    SignatureProgress::insert_many(models).exec(db).await?;
    Ok(())
}

/// Clears the data of a row and removes its completions; the row stays.
pub(crate) async fn clear_row<C>(db: &C, row: monthly_progress::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let row_id = row.id;
    write_row_data(db, row, RowData::default()).await?;
    replace_completions(db, row_id, &[]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::period::Cadence;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 1).await?;
        let key = PeriodKey::month(created.contract.id, 2025, 4);

        let first = get_or_create_period_row(&db, key).await?;
        let second = get_or_create_period_row(&db, key).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(first.sub_period, Some(1));
        assert_eq!(MonthlyProgress::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_row_matches_first_half() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 1).await?;
        let legacy = insert_legacy_row(&db, created.contract.id, 2025, 6).await?;

        let found = get_or_create_period_row(&db, PeriodKey::month(created.contract.id, 2025, 6))
            .await?;
        assert_eq!(found.id, legacy.id);

        let second_half =
            get_or_create_period_row(&db, PeriodKey::half(created.contract.id, 2025, 6, 2))
                .await?;
        assert_ne!(second_half.id, legacy.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 1).await?;
        let id = created.contract.id;

        let bad_month = get_or_create_period_row(&db, PeriodKey::month(id, 2025, 13)).await;
        assert!(matches!(bad_month, Err(Error::Validation { .. })));

        let bad_half = get_or_create_period_row(&db, PeriodKey::half(id, 2025, 1, 3)).await;
        assert!(matches!(bad_half, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_step() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 2).await?;
        let key = PeriodKey::month(created.contract.id, 2025, 1);
        let step = created.signatures[0].id;

        let done = set_step_completed(&db, key, step, true).await?;
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());

        let undone = set_step_completed(&db, key, step, false).await?;
        assert_eq!(undone.id, done.id);
        assert!(!undone.is_completed);
        assert!(undone.completed_at.is_none());
        assert_eq!(SignatureProgress::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_step_of_other_contract_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_contract(&db, "A", Cadence::Monthly, 1).await?;
        let b = create_test_contract(&db, "B", Cadence::Monthly, 1).await?;

        let key = PeriodKey::month(a.contract.id, 2025, 1);
        let result = set_step_completed(&db, key, b.signatures[0].id, true).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_upload_and_notes() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 1).await?;
        let key = PeriodKey::month(created.contract.id, 2025, 2);

        let row = set_upload(&db, key, Some(" https://drive.example/x ".to_string()), true).await?;
        assert_eq!(row.upload_link.as_deref(), Some("https://drive.example/x"));
        assert!(row.is_upload_completed);

        let row = set_upload(&db, key, Some("   ".to_string()), false).await?;
        assert!(row.upload_link.is_none());

        let row = update_notes(&db, key, Some("waiting for stamp".to_string())).await?;
        assert_eq!(row.notes.as_deref(), Some("waiting for stamp"));
        assert!(row.notes_updated_at.is_some());

        let row = update_notes(&db, key, None).await?;
        assert!(row.notes.is_none());
        assert!(row.notes_updated_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_row_keeps_row() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_contract(&db, "Cleaning", Cadence::Monthly, 1).await?;
        let key = PeriodKey::month(created.contract.id, 2025, 2);
        set_upload(&db, key, Some("link".to_string()), true).await?;
        set_step_completed(&db, key, created.signatures[0].id, true).await?;

        let row = get_or_create_period_row(&db, key).await?;
        clear_row(&db, row.clone()).await?;

        let cleared = get_or_create_period_row(&db, key).await?;
        assert_eq!(cleared.id, row.id);
        assert!(RowData::of(&cleared).is_empty());
        assert_eq!(SignatureProgress::find().count(&db).await?, 0);
        Ok(())
    }
}
