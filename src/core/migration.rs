//! Period migration engine.
//!
//! Changes the reporting cadence of a contract-year and reshapes the recorded
//! progress to match: merging months when the cadence gets coarser, splitting
//! them when it gets finer, clearing months that become inactive and, for the
//! half-month cadence, seeding the second half of every month.
//!
//! The passes always run in the same order:
//!
//! 1. snapshot the current rows, completions and roster
//! 2. merge directives
//! 3. split directives
//! 4. deactivation of every month outside the new cadence
//! 5. write-back of the cadence label
//! 6. half-month expansion (half-month target only)
//!
//! Everything runs inside one database transaction; a failure in any pass
//! rolls the whole migration back and the storage error is returned as is.

use crate::{
    core::{
        contract::{get_contract, get_signatures},
        period::{Cadence, MONTHS, Transition, join_notes, normalize_sub_period},
        progress::{contract_cadence, group_by, index_period_rows},
        tracking::{
            CompletionData, PeriodKey, RowData, clear_row, find_period_row,
            get_or_create_period_row, replace_completions, write_row_data,
        },
    },
    entities::{MonthlyProgress, SignatureProgress, contract, monthly_progress, signature, signature_progress},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// How the second half of each month is seeded when converting into the
/// half-month cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalfMonthMode {
    /// Copy the first half's upload, notes and completions
    #[default]
    Duplicate,
    /// Start the second half empty
    Empty,
}

/// Promotes one month's data into a month that stays active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDirective {
    /// Month that receives the data
    pub target_month: i32,
    /// Month whose upload and completions are copied
    pub source_month: i32,
    /// Notes of the folded-in months, joined into the target's note
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Share of a split source month assigned to one new month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTarget {
    /// Month that receives the share
    pub target_month: i32,
    /// Completion percentage, 0-100
    pub percentage: u8,
}

/// Spreads one month's progress over newly active months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDirective {
    /// Month the progress comes from
    pub source_month: i32,
    /// Where it goes
    pub distribution: Vec<SplitTarget>,
}

/// A cadence change for one contract-year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    /// Contract to migrate
    pub contract_id: i64,
    /// Year whose progress is reshaped
    pub year: i32,
    /// Target cadence
    pub cadence: Cadence,
    /// Merge directives, used when the cadence gets coarser
    #[serde(default)]
    pub merge: Vec<MergeDirective>,
    /// Split directives, used when the cadence gets finer
    #[serde(default)]
    pub split: Vec<SplitDirective>,
    /// Seeding of the second half of each month
    #[serde(default)]
    pub half_month_mode: HalfMonthMode,
}

impl MigrationRequest {
    /// A request without merge or split directives.
    #[must_use]
    pub const fn new(contract_id: i64, year: i32, cadence: Cadence) -> Self {
        Self {
            contract_id,
            year,
            cadence,
            merge: Vec::new(),
            split: Vec::new(),
            half_month_mode: HalfMonthMode::Duplicate,
        }
    }

    fn validate(&self) -> Result<()> {
        let months = self
            .merge
            .iter()
            .flat_map(|d| [d.target_month, d.source_month])
            .chain(self.split.iter().flat_map(|d| {
                std::iter::once(d.source_month).chain(d.distribution.iter().map(|t| t.target_month))
            }));
        for month in months {
            if !MONTHS.contains(&month) {
                return Err(Error::Validation {
                    message: format!("Month {month} is outside 1-12"),
                });
            }
        }

        if let Some(target) = self
            .split
            .iter()
            .flat_map(|d| &d.distribution)
            .find(|t| t.percentage > 100)
        {
            return Err(Error::Validation {
                message: format!(
                    "Split percentage {} for month {} exceeds 100",
                    target.percentage, target.target_month
                ),
            });
        }
        Ok(())
    }
}

/// What a migration changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    /// Migrated contract
    pub contract_id: i64,
    /// Migrated year
    pub year: i32,
    /// Cadence before the migration
    pub from: Cadence,
    /// Cadence after the migration
    pub to: Cadence,
    /// Months that received merged data
    pub merged_months: Vec<i32>,
    /// Months that received split data
    pub split_months: Vec<i32>,
    /// Inactive months whose data was cleared
    pub cleared_months: Vec<i32>,
    /// Rows created by the half-month expansion
    pub half_month_rows_created: usize,
}

/// What a migration to `to` would do to the recorded data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPreview {
    /// Current cadence
    pub from: Cadence,
    /// Target cadence
    pub to: Cadence,
    /// Direction of the change
    pub transition: Transition,
    /// Months that currently hold data or completions
    pub months_with_data: Vec<i32>,
    /// Of those, the months cleared unless merge or split directives move
    /// their data first
    pub months_losing_data: Vec<i32>,
}

/// Migrates a contract-year to a new cadence.
///
/// Runs the six passes described in the module docs inside one transaction.
///
/// # Arguments
/// * `db` - Database connection
/// * `request` - Contract, year, target cadence, merge and split directives
///   and the half-month seeding mode
///
/// # Returns
/// A summary of the merged, split and cleared months. On any error nothing
/// is written: validation fails with `Error::Validation`, a missing contract
/// with `Error::ContractNotFound` and a storage failure with the backend's
/// `Error::Database`.
pub async fn migrate_period(
    db: &DatabaseConnection,
    request: &MigrationRequest,
) -> Result<MigrationSummary> {
    request.validate()?;

    let txn = db.begin().await?;
    let summary = run_migration(&txn, request).await?;
    txn.commit().await?;

    info!(
        "Migrated contract {} ({}) from {} to {}: merged {:?}, split {:?}, cleared {:?}, {} half-month rows created",
        summary.contract_id,
        summary.year,
        summary.from,
        summary.to,
        summary.merged_months,
        summary.split_months,
        summary.cleared_months,
        summary.half_month_rows_created
    );
    Ok(summary)
}

/// Reports which months hold data and which of them a migration to `to`
/// would clear.
pub async fn preview_migration(
    db: &DatabaseConnection,
    contract_id: i64,
    year: i32,
    to: Cadence,
) -> Result<MigrationPreview> {
    let contract = get_contract(db, contract_id).await?;
    let from = contract_cadence(&contract);
    let snapshot = Snapshot::load(db, contract_id, year).await?;

    let mut with_data = BTreeSet::new();
    let mut losing = BTreeSet::new();
    for row in snapshot.rows_with_data() {
        with_data.insert(row.month);
        if is_inactive(to, row) {
            losing.insert(row.month);
        }
    }

    Ok(MigrationPreview {
        from,
        to,
        transition: from.transition_to(to),
        months_with_data: with_data.into_iter().collect(),
        months_losing_data: losing.into_iter().collect(),
    })
}

/// Completed items for a split share: `round(percentage / 100 * total_items)`.
#[must_use]
pub const fn split_completed_items(percentage: u8, total_items: usize) -> usize {
    (percentage as usize * total_items * 2 + 100) / 200
}

async fn run_migration<C>(db: &C, request: &MigrationRequest) -> Result<MigrationSummary>
where
    C: ConnectionTrait,
{
    let contract = get_contract(db, request.contract_id).await?;
    let from = contract_cadence(&contract);
    let to = request.cadence;
    let signatures = get_signatures(db, request.contract_id).await?;
    let snapshot = Snapshot::load(db, request.contract_id, request.year).await?;
    debug!(
        "Migrating contract {} ({}) {from} -> {to}: {} rows, {} sign-off steps",
        request.contract_id,
        request.year,
        snapshot.rows.len(),
        signatures.len()
    );

    let merged_months = merge_pass(db, request, &snapshot).await?;
    let split_months = split_pass(db, request, &snapshot, &signatures).await?;
    let cleared_months = deactivation_pass(db, request).await?;
    write_back_cadence(db, contract, to).await?;

    let half_month_rows_created = if to.is_half_month() {
        half_month_expansion(db, request, !from.is_half_month()).await?
    } else {
        0
    };

    Ok(MigrationSummary {
        contract_id: request.contract_id,
        year: request.year,
        from,
        to,
        merged_months,
        split_months,
        cleared_months,
        half_month_rows_created,
    })
}

/// Rows and completions of a contract-year as they were before the migration.
struct Snapshot {
    rows: Vec<monthly_progress::Model>,
    slots: HashMap<(i32, i32), monthly_progress::Model>,
    completions: HashMap<i64, Vec<signature_progress::Model>>,
}

impl Snapshot {
    async fn load<C>(db: &C, contract_id: i64, year: i32) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let rows = MonthlyProgress::find()
            .filter(monthly_progress::Column::ContractId.eq(contract_id))
            .filter(monthly_progress::Column::Year.eq(year))
            .all(db)
            .await?;
        let row_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let completions = if row_ids.is_empty() {
            Vec::new()
        } else {
            SignatureProgress::find()
                .filter(signature_progress::Column::MonthlyProgressId.is_in(row_ids))
                .all(db)
                .await?
        };

        let slots = index_period_rows(&rows)
            .into_iter()
            .map(|(slot, row)| (slot, row.clone()))
            .collect();

        Ok(Self {
            slots,
            completions: group_by(completions, |c| c.monthly_progress_id),
            rows,
        })
    }

    fn first_half(&self, month: i32) -> Option<&monthly_progress::Model> {
        self.slots.get(&(month, 1))
    }

    fn data_of(&self, month: i32) -> RowData {
        self.first_half(month).map(RowData::of).unwrap_or_default()
    }

    fn completions_of(&self, month: i32) -> Vec<CompletionData> {
        self.first_half(month)
            .and_then(|row| self.completions.get(&row.id))
            .map(|list| list.iter().map(CompletionData::from).collect())
            .unwrap_or_default()
    }

    fn rows_with_data(&self) -> impl Iterator<Item = &monthly_progress::Model> {
        self.rows.iter().filter(|row| {
            !RowData::of(row).is_empty()
                || self.completions.get(&row.id).is_some_and(|c| !c.is_empty())
        })
    }
}

fn is_inactive(cadence: Cadence, row: &monthly_progress::Model) -> bool {
    !cadence.is_active(row.month)
        || (!cadence.is_half_month() && normalize_sub_period(row.sub_period) != 1)
}

async fn merge_pass<C>(db: &C, request: &MigrationRequest, snapshot: &Snapshot) -> Result<Vec<i32>>
where
    C: ConnectionTrait,
{
    // A month that receives data must not be cleared as another's source
    let targets: HashSet<i32> = request.merge.iter().map(|d| d.target_month).collect();
    let mut merged = Vec::with_capacity(request.merge.len());

    for directive in &request.merge {
        let source = snapshot.data_of(directive.source_month);
        let notes = join_notes(&directive.notes).or(source.notes);
        let data = RowData {
            upload_link: source.upload_link,
            is_upload_completed: source.is_upload_completed,
            notes,
        };

        let key = PeriodKey::month(request.contract_id, request.year, directive.target_month);
        let target = get_or_create_period_row(db, key).await?;
        let target_id = target.id;
        write_row_data(db, target, data).await?;
        replace_completions(db, target_id, &snapshot.completions_of(directive.source_month))
            .await?;

        if directive.source_month != directive.target_month
            && !targets.contains(&directive.source_month)
        {
            let source_key =
                PeriodKey::month(request.contract_id, request.year, directive.source_month);
            if let Some(row) = find_period_row(db, source_key).await? {
                clear_row(db, row).await?;
            }
        }

        debug!(
            "Merged month {} into month {}",
            directive.source_month, directive.target_month
        );
        merged.push(directive.target_month);
    }

    Ok(merged)
}

async fn split_pass<C>(
    db: &C,
    request: &MigrationRequest,
    snapshot: &Snapshot,
    signatures: &[signature::Model],
) -> Result<Vec<i32>>
where
    C: ConnectionTrait,
{
    let total_items = signatures.len() + 1;
    let mut split = Vec::new();

    for directive in &request.split {
        let source = snapshot.data_of(directive.source_month);

        for share in &directive.distribution {
            let completed_items = split_completed_items(share.percentage, total_items);
            let completed_sigs = completed_items.saturating_sub(1);
            let upload_done = completed_items >= total_items;

            let key = PeriodKey::month(request.contract_id, request.year, share.target_month);
            let target = get_or_create_period_row(db, key).await?;
            let target_id = target.id;
            let data = RowData {
                upload_link: if upload_done {
                    source.upload_link.clone()
                } else {
                    target.upload_link.clone()
                },
                is_upload_completed: upload_done,
                notes: target.notes.clone(),
            };
            write_row_data(db, target, data).await?;

            let now = Utc::now();
            let completions: Vec<CompletionData> = signatures
                .iter()
                .enumerate()
                .map(|(rank, sig)| {
                    let done = rank < completed_sigs;
                    CompletionData {
                        signature_id: sig.id,
                        is_completed: done,
                        completed_at: done.then_some(now),
                    }
                })
                .collect();
            replace_completions(db, target_id, &completions).await?;

            debug!(
                "Split month {} into month {} at {}% ({completed_items}/{total_items} items)",
                directive.source_month, share.target_month, share.percentage
            );
            split.push(share.target_month);
        }
    }

    Ok(split)
}

async fn deactivation_pass<C>(db: &C, request: &MigrationRequest) -> Result<Vec<i32>>
where
    C: ConnectionTrait,
{
    let inactive: Vec<monthly_progress::Model> = MonthlyProgress::find()
        .filter(monthly_progress::Column::ContractId.eq(request.contract_id))
        .filter(monthly_progress::Column::Year.eq(request.year))
        .all(db)
        .await?
        .into_iter()
        .filter(|row| is_inactive(request.cadence, row))
        .collect();

    if inactive.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = inactive.iter().map(|r| r.id).collect();
    let with_completions: HashSet<i64> = SignatureProgress::find()
        .filter(signature_progress::Column::MonthlyProgressId.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.monthly_progress_id)
        .collect();

    let mut cleared = BTreeSet::new();
    for row in inactive {
        if !RowData::of(&row).is_empty() || with_completions.contains(&row.id) {
            cleared.insert(row.month);
        }
        clear_row(db, row).await?;
    }

    debug!("Cleared inactive months {cleared:?}");
    Ok(cleared.into_iter().collect())
}

async fn write_back_cadence<C>(db: &C, contract: contract::Model, cadence: Cadence) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut active: contract::ActiveModel = contract.into();
    active.period = Set(cadence.label());
    active.update(db).await?;
    Ok(())
}

/// Ensures both halves of every month exist. Returns the number of rows
/// created.
///
/// When `converting` (the contract was not half-month before), the second
/// half is seeded according to the mode. Otherwise missing second halves are
/// created empty and existing ones are left alone.
async fn half_month_expansion<C>(
    db: &C,
    request: &MigrationRequest,
    converting: bool,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut created = 0;

    for month in MONTHS {
        let first_key = PeriodKey::half(request.contract_id, request.year, month, 1);
        let first = match find_period_row(db, first_key).await? {
            Some(row) if row.sub_period.is_none() => {
                let mut active: monthly_progress::ActiveModel = row.into();
                active.sub_period = Set(Some(1));
                active.update(db).await?
            }
            Some(row) => row,
            None => {
                created += 1;
                get_or_create_period_row(db, first_key).await?
            }
        };

        let second_key = PeriodKey::half(request.contract_id, request.year, month, 2);
        let second = match find_period_row(db, second_key).await? {
            Some(row) => row,
            None => {
                created += 1;
                get_or_create_period_row(db, second_key).await?
            }
        };
        if !converting {
            continue;
        }

        let (data, completions) = match request.half_month_mode {
            HalfMonthMode::Duplicate => {
                let completions: Vec<CompletionData> = SignatureProgress::find()
                    .filter(signature_progress::Column::MonthlyProgressId.eq(first.id))
                    .all(db)
                    .await?
                    .iter()
                    .map(CompletionData::from)
                    .collect();
                (RowData::of(&first), completions)
            }
            HalfMonthMode::Empty => (RowData::default(), Vec::new()),
        };

        let second_id = second.id;
        write_row_data(db, second, data).await?;
        replace_completions(db, second_id, &completions).await?;
    }

    debug!(
        "Half-month expansion ({:?}) created {created} rows",
        request.half_month_mode
    );
    Ok(created)
}
