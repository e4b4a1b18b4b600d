//! Progress aggregation.
//!
//! Turns the raw period rows and step completions of one contract-year into a
//! per-period view with percentages, and folds that view into a yearly
//! status. Everything here is pure; the rows are fetched in bulk beforehand by
//! [`crate::core::dashboard`].

use crate::{
    core::period::{Cadence, normalize_sub_period},
    entities::{contract, monthly_progress, signature, signature_progress},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Completion state of one sign-off step within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    /// Sign-off step id
    pub signature_id: i64,
    /// Signer name
    pub name: String,
    /// Signer role
    pub role: String,
    /// Rank within the roster
    pub order: i32,
    /// Whether the step is done
    pub is_completed: bool,
    /// When it was done
    pub completed_at: Option<DateTime<Utc>>,
}

/// Computed progress of one (month, sub-period) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodProgressDetail {
    /// Calendar month, 1-12
    pub month: i32,
    /// 1, or 2 for the second half of a half-month period
    pub sub_period: i32,
    /// Stored row backing this slot, if any
    pub progress_id: Option<i64>,
    /// Link to the uploaded document
    pub upload_link: Option<String>,
    /// Whether the upload step is done
    pub is_upload_completed: bool,
    /// Free-text notes
    pub notes: Option<String>,
    /// When the notes were last edited
    pub notes_updated_at: Option<DateTime<Utc>>,
    /// Sign-off steps in roster order
    pub steps: Vec<StepStatus>,
    /// Sign-off steps plus the upload step
    pub total_items: u32,
    /// Completed steps plus the upload step when done
    pub completed_items: u32,
    /// `round(100 * completed_items / total_items)`
    pub percentage: u8,
}

/// Rollup of every relevant period of a contract-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearlyStatus {
    /// Every relevant period is at 100%
    Completed,
    /// Some period has progress but not all are done
    InProgress,
    /// No period has any progress
    NotStarted,
}

/// A contract with its roster, per-period view and yearly status.
#[derive(Debug, Clone, Serialize)]
pub struct ContractProgress {
    /// The contract
    pub contract: contract::Model,
    /// Its cadence, parsed from the period label
    pub cadence: Cadence,
    /// Sign-off steps in roster order
    pub signatures: Vec<signature::Model>,
    /// 12 slots, or 24 for the half-month cadence
    pub periods: Vec<PeriodProgressDetail>,
    /// Rollup over the active periods
    pub status: YearlyStatus,
}

impl ContractProgress {
    /// Builds the full progress of a contract from its raw rows.
    #[must_use]
    pub fn build(
        contract: contract::Model,
        mut signatures: Vec<signature::Model>,
        rows: &[monthly_progress::Model],
        completions: &[signature_progress::Model],
    ) -> Self {
        signatures.sort_by_key(|s| s.order);
        let cadence = contract_cadence(&contract);
        let periods = build_period_view(&contract, &signatures, rows, completions);
        let status = yearly_status(&periods, cadence);
        Self {
            contract,
            cadence,
            signatures,
            periods,
            status,
        }
    }
}

/// Percentage of completed items, rounded half-up; 0 when there are no items.
#[must_use]
pub const fn percentage(completed_items: u32, total_items: u32) -> u8 {
    if total_items == 0 {
        return 0;
    }
    let completed = if completed_items > total_items {
        total_items
    } else {
        completed_items
    };
    // round(100 * c / t) without floats: floor((200c + t) / 2t)
    #[allow(clippy::cast_possible_truncation)]
    let pct = ((200 * completed as u64 + total_items as u64) / (2 * total_items as u64)) as u8;
    pct
}

/// Cadence of a contract; labels that cannot be parsed read as monthly.
#[must_use]
pub fn contract_cadence(contract: &contract::Model) -> Cadence {
    Cadence::parse(&contract.period).unwrap_or_else(|_| {
        tracing::warn!(
            "Contract {} has unrecognised period {:?}, treating as monthly",
            contract.id,
            contract.period
        );
        Cadence::Monthly
    })
}

/// Groups items into a key → list map in one pass.
pub fn group_by<K, V, F>(items: impl IntoIterator<Item = V>, key: F) -> HashMap<K, Vec<V>>
where
    K: Eq + Hash,
    F: Fn(&V) -> K,
{
    let mut groups: HashMap<K, Vec<V>> = HashMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}

/// Indexes period rows by (month, canonical sub-period).
///
/// A legacy row without a sub-period and an explicit sub-period 1 row land on
/// the same key; the explicit row wins.
#[must_use]
pub fn index_period_rows(
    rows: &[monthly_progress::Model],
) -> HashMap<(i32, i32), &monthly_progress::Model> {
    let mut index: HashMap<(i32, i32), &monthly_progress::Model> = HashMap::new();
    for row in rows {
        let key = (row.month, normalize_sub_period(row.sub_period));
        match index.get(&key) {
            Some(existing) if existing.sub_period.is_some() && row.sub_period.is_none() => {}
            _ => {
                index.insert(key, row);
            }
        }
    }
    index
}

/// Builds the per-period view of one contract-year.
///
/// # Arguments
/// * `contract` - The contract; its period label decides the slots
/// * `signatures` - Its sign-off steps, in any order
/// * `rows` - Period rows of the year, legacy rows included
/// * `completions` - Step completions of those rows
///
/// # Returns
/// 12 slots (sub-period 1 of every month), or 24 for a half-month contract,
/// in calendar order. Steps without a completion row count as not completed.
#[must_use]
pub fn build_period_view(
    contract: &contract::Model,
    signatures: &[signature::Model],
    rows: &[monthly_progress::Model],
    completions: &[signature_progress::Model],
) -> Vec<PeriodProgressDetail> {
    let cadence = contract_cadence(contract);

    let mut ordered: Vec<&signature::Model> = signatures.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let rows_by_slot = index_period_rows(rows);
    let completions_by_row: HashMap<i64, HashMap<i64, &signature_progress::Model>> =
        group_by(completions, |c| c.monthly_progress_id)
            .into_iter()
            .map(|(row_id, list)| {
                let by_signature = list.into_iter().map(|c| (c.signature_id, c)).collect();
                (row_id, by_signature)
            })
            .collect();

    cadence
        .period_slots()
        .into_iter()
        .map(|(month, sub_period)| {
            let row = rows_by_slot.get(&(month, sub_period)).copied();
            let row_completions = row.and_then(|r| completions_by_row.get(&r.id));

            let steps: Vec<StepStatus> = ordered
                .iter()
                .map(|sig| {
                    let completion = row_completions.and_then(|m| m.get(&sig.id));
                    StepStatus {
                        signature_id: sig.id,
                        name: sig.name.clone(),
                        role: sig.role.clone(),
                        order: sig.order,
                        is_completed: completion.is_some_and(|c| c.is_completed),
                        completed_at: completion.and_then(|c| c.completed_at),
                    }
                })
                .collect();

            let is_upload_completed = row.is_some_and(|r| r.is_upload_completed);
            let total_items = u32::try_from(steps.len()).unwrap_or(u32::MAX).saturating_add(1);
            let completed_steps =
                u32::try_from(steps.iter().filter(|s| s.is_completed).count()).unwrap_or(u32::MAX);
            let completed_items = completed_steps + u32::from(is_upload_completed);

            PeriodProgressDetail {
                month,
                sub_period,
                progress_id: row.map(|r| r.id),
                upload_link: row.and_then(|r| r.upload_link.clone()),
                is_upload_completed,
                notes: row.and_then(|r| r.notes.clone()),
                notes_updated_at: row.and_then(|r| r.notes_updated_at),
                steps,
                total_items,
                completed_items,
                percentage: percentage(completed_items, total_items),
            }
        })
        .collect()
}

/// Folds the periods of a contract-year into a yearly status.
///
/// Only months active under `cadence` count; for the half-month cadence both
/// halves of every month have to reach 100%.
#[must_use]
pub fn yearly_status(periods: &[PeriodProgressDetail], cadence: Cadence) -> YearlyStatus {
    let relevant: Vec<&PeriodProgressDetail> = periods
        .iter()
        .filter(|p| cadence.is_active(p.month))
        .collect();

    if relevant.is_empty() {
        YearlyStatus::NotStarted
    } else if relevant.iter().all(|p| p.percentage == 100) {
        YearlyStatus::Completed
    } else if relevant.iter().any(|p| p.percentage > 0) {
        YearlyStatus::InProgress
    } else {
        YearlyStatus::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(period: &str) -> contract::Model {
        contract::Model {
            id: 1,
            customer_id: 1,
            area_id: 1,
            name: "Cleaning Service".to_string(),
            period: period.to_string(),
            invoice_type: "Reguler".to_string(),
            notes: None,
            year: 2025,
        }
    }

    fn signatures(count: i32) -> Vec<signature::Model> {
        (1..=count)
            .map(|i| signature::Model {
                id: i64::from(i),
                contract_id: 1,
                name: format!("Signer {i}"),
                role: "Manager".to_string(),
                order: i,
            })
            .collect()
    }

    fn row(id: i64, month: i32, sub_period: Option<i32>, upload: bool) -> monthly_progress::Model {
        monthly_progress::Model {
            id,
            contract_id: 1,
            month,
            year: 2025,
            sub_period,
            upload_link: upload.then(|| format!("https://files.example/{id}")),
            is_upload_completed: upload,
            notes: None,
            notes_updated_at: None,
            updated_at: Utc::now(),
        }
    }

    fn done(id: i64, row_id: i64, signature_id: i64) -> signature_progress::Model {
        signature_progress::Model {
            id,
            monthly_progress_id: row_id,
            signature_id,
            is_completed: true,
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(0, 4), 0);
        assert_eq!(percentage(4, 4), 100);
        assert_eq!(percentage(2, 4), 50);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
    }

    #[test]
    fn test_standard_contract_has_twelve_slots() {
        let view = build_period_view(&contract("Per 3 Bulan"), &signatures(2), &[], &[]);
        assert_eq!(view.len(), 12);
        assert!(view.iter().all(|p| p.sub_period == 1));
        assert!(view.iter().all(|p| p.total_items == 3 && p.percentage == 0));
        assert!(view.iter().all(|p| p.progress_id.is_none()));
    }

    #[test]
    fn test_half_month_contract_has_twenty_four_slots() {
        let view = build_period_view(&contract("Per 1/2 Bulan"), &signatures(1), &[], &[]);
        assert_eq!(view.len(), 24);
        assert_eq!((view[2].month, view[2].sub_period), (2, 1));
        assert_eq!((view[3].month, view[3].sub_period), (2, 2));
    }

    #[test]
    fn test_partial_month_percentage() {
        // 3 steps, 2 done, upload pending: 2/4
        let rows = vec![row(10, 5, Some(1), false)];
        let completions = vec![done(1, 10, 1), done(2, 10, 2)];
        let view = build_period_view(&contract("1 bulan"), &signatures(3), &rows, &completions);

        let may = &view[4];
        assert_eq!(may.month, 5);
        assert_eq!(may.progress_id, Some(10));
        assert_eq!(may.completed_items, 2);
        assert_eq!(may.total_items, 4);
        assert_eq!(may.percentage, 50);
        assert!(may.steps[0].is_completed && may.steps[1].is_completed);
        assert!(!may.steps[2].is_completed);
        assert!(may.steps[2].completed_at.is_none());
    }

    #[test]
    fn test_legacy_row_reads_as_first_sub_period() {
        let rows = vec![row(10, 3, None, true)];
        let view = build_period_view(&contract("Per 1 Bulan"), &signatures(0), &rows, &[]);
        assert_eq!(view[2].progress_id, Some(10));
        assert_eq!(view[2].percentage, 100);
    }

    #[test]
    fn test_explicit_row_wins_over_legacy_row() {
        let rows = vec![row(10, 3, Some(1), true), row(11, 3, None, false)];
        let index = index_period_rows(&rows);
        assert_eq!(index[&(3, 1)].id, 10);

        let rows = vec![row(11, 3, None, false), row(10, 3, Some(1), true)];
        let index = index_period_rows(&rows);
        assert_eq!(index[&(3, 1)].id, 10);
    }

    #[test]
    fn test_second_half_ignored_for_standard_contract() {
        let rows = vec![row(10, 4, Some(2), true)];
        let view = build_period_view(&contract("Per 1 Bulan"), &signatures(1), &rows, &[]);
        assert_eq!(view[3].progress_id, None);
        assert_eq!(view[3].percentage, 0);
    }

    #[test]
    fn test_steps_follow_roster_order() {
        let mut sigs = signatures(3);
        sigs.reverse();
        let view = build_period_view(&contract("Per 1 Bulan"), &sigs, &[], &[]);
        let orders: Vec<i32> = view[0].steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn test_yearly_status_uses_active_months() {
        let rows: Vec<_> = [3, 6, 9, 12]
            .iter()
            .map(|&m| row(i64::from(m), m, Some(1), true))
            .collect();
        let view = build_period_view(&contract("Per 3 Bulan"), &signatures(0), &rows, &[]);
        assert_eq!(yearly_status(&view, Cadence::Quarterly), YearlyStatus::Completed);
        assert_eq!(yearly_status(&view, Cadence::Monthly), YearlyStatus::InProgress);
    }

    #[test]
    fn test_yearly_status_not_started() {
        let view = build_period_view(&contract("Per 1 Bulan"), &signatures(2), &[], &[]);
        assert_eq!(yearly_status(&view, Cadence::Monthly), YearlyStatus::NotStarted);
    }

    #[test]
    fn test_half_month_needs_both_halves() {
        let mut rows: Vec<_> = (1..=12)
            .map(|m| row(i64::from(m), m, Some(1), true))
            .collect();
        let view = build_period_view(&contract("Per 1/2 Bulan"), &signatures(0), &rows, &[]);
        assert_eq!(yearly_status(&view, Cadence::HalfMonth), YearlyStatus::InProgress);

        rows.extend((1..=12).map(|m| row(100 + i64::from(m), m, Some(2), true)));
        let view = build_period_view(&contract("Per 1/2 Bulan"), &signatures(0), &rows, &[]);
        assert_eq!(yearly_status(&view, Cadence::HalfMonth), YearlyStatus::Completed);
    }

    #[test]
    fn test_contract_progress_build() {
        let rows = vec![row(10, 1, Some(1), true)];
        let completions = vec![done(1, 10, 1)];
        let progress =
            ContractProgress::build(contract("Per 1 Bulan"), signatures(1), &rows, &completions);
        assert_eq!(progress.cadence, Cadence::Monthly);
        assert_eq!(progress.periods[0].percentage, 100);
        assert_eq!(progress.status, YearlyStatus::InProgress);
    }

    #[test]
    fn test_unparseable_period_reads_as_monthly() {
        assert_eq!(contract_cadence(&contract("sometimes")), Cadence::Monthly);
    }
}
