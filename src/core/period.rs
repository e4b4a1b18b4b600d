//! Reporting cadence of a contract.
//!
//! A contract stores its cadence as a label such as `"Per 3 Bulan"`. The label
//! is parsed into a [`Cadence`], which decides which calendar months carry a
//! progress record and how many sub-periods each month has.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar months, 1-based.
pub const MONTHS: std::ops::RangeInclusive<i32> = 1..=12;

/// Notes from folded-in months are joined with this separator.
pub const NOTES_SEPARATOR: &str = "\n---\n";

/// How many calendar months make up one reporting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    /// Two sub-periods per month
    HalfMonth,
    /// Every month
    Monthly,
    /// Every 2 months
    BiMonthly,
    /// Every 3 months
    Quarterly,
    /// Every 4 months
    FourMonthly,
    /// Every 6 months
    SemiAnnual,
    /// Once a year
    Annual,
}

/// Direction of a cadence change, which decides the data a migration needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// Same cadence; only deactivation and write-back apply
    Unchanged,
    /// Fewer, longer periods; progress is merged into the remaining months
    Coarser,
    /// More, shorter periods; progress is split across the new months
    Finer,
}

impl Cadence {
    /// Every supported cadence, finest first.
    pub const ALL: [Self; 7] = [
        Self::HalfMonth,
        Self::Monthly,
        Self::BiMonthly,
        Self::Quarterly,
        Self::FourMonthly,
        Self::SemiAnnual,
        Self::Annual,
    ];

    /// Number of months per cycle, `None` for the half-month cadence.
    #[must_use]
    pub const fn months(self) -> Option<i32> {
        match self {
            Self::HalfMonth => None,
            Self::Monthly => Some(1),
            Self::BiMonthly => Some(2),
            Self::Quarterly => Some(3),
            Self::FourMonthly => Some(4),
            Self::SemiAnnual => Some(6),
            Self::Annual => Some(12),
        }
    }

    /// Maps a month count to a cadence.
    pub fn from_months(months: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|cadence| cadence.months() == Some(months))
            .ok_or_else(|| Error::InvalidCadence {
                label: months.to_string(),
            })
    }

    /// Parses a period label.
    ///
    /// Any label containing `"1/2"` is the half-month cadence. Otherwise the
    /// first number in the label is the month count (`"Per 3 Bulan"`,
    /// `"3 bulan"`). A bare `"bulanan"`/`"per bulan"` means monthly and a
    /// label mentioning `"tahun"` means annual.
    pub fn parse(label: &str) -> Result<Self> {
        let lower = label.trim().to_lowercase();
        if lower.contains("1/2") {
            return Ok(Self::HalfMonth);
        }

        let digits: String = lower
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();

        if let Ok(months) = digits.parse::<i32>() {
            return Self::from_months(months).map_err(|_| Error::InvalidCadence {
                label: label.to_string(),
            });
        }

        if digits.is_empty() {
            if lower.contains("bulan") {
                return Ok(Self::Monthly);
            }
            if lower.contains("tahun") {
                return Ok(Self::Annual);
            }
        }

        Err(Error::InvalidCadence {
            label: label.to_string(),
        })
    }

    /// Canonical label written back to the contract.
    #[must_use]
    pub fn label(self) -> String {
        self.months().map_or_else(
            || "Per 1/2 Bulan".to_string(),
            |months| format!("Per {months} Bulan"),
        )
    }

    /// Whether this is the half-month cadence.
    #[must_use]
    pub const fn is_half_month(self) -> bool {
        matches!(self, Self::HalfMonth)
    }

    /// Number of sub-periods per active month.
    #[must_use]
    pub const fn sub_periods(self) -> i32 {
        if self.is_half_month() { 2 } else { 1 }
    }

    /// Months holding a progress record: every multiple of the cycle length
    /// up to 12, or all months for the half-month cadence.
    #[must_use]
    pub fn active_months(self) -> Vec<i32> {
        match self.months() {
            None => MONTHS.collect(),
            Some(step) => MONTHS.filter(|month| month % step == 0).collect(),
        }
    }

    /// Whether `month` is active under this cadence.
    #[must_use]
    pub fn is_active(self, month: i32) -> bool {
        MONTHS.contains(&month) && self.months().is_none_or(|step| month % step == 0)
    }

    /// Every (month, sub-period) pair shown for a contract with this cadence:
    /// 24 pairs for the half-month cadence, 12 otherwise.
    #[must_use]
    pub fn period_slots(self) -> Vec<(i32, i32)> {
        MONTHS
            .flat_map(|month| (1..=self.sub_periods()).map(move |sub| (month, sub)))
            .collect()
    }

    /// Classifies a change from `self` to `target`.
    #[must_use]
    pub fn transition_to(self, target: Self) -> Transition {
        // Half a month sorts below every whole-month cadence
        let rank = |cadence: Self| cadence.months().map_or(0, |months| months * 2);
        match rank(target).cmp(&rank(self)) {
            std::cmp::Ordering::Equal => Transition::Unchanged,
            std::cmp::Ordering::Greater => Transition::Coarser,
            std::cmp::Ordering::Less => Transition::Finer,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Cadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Canonical sub-period of a stored row.
///
/// Rows created before the half-month cadence existed have no sub-period;
/// they read as the first half, the same as an explicit 1.
#[must_use]
pub const fn normalize_sub_period(sub_period: Option<i32>) -> i32 {
    match sub_period {
        None => 1,
        Some(sub) => sub,
    }
}

/// Joins notes from folded-in months into a single note.
#[must_use]
pub fn join_notes<S: AsRef<str>>(notes: &[S]) -> Option<String> {
    let parts: Vec<&str> = notes
        .iter()
        .map(AsRef::as_ref)
        .filter(|note| !note.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(NOTES_SEPARATOR))
    }
}
