//! Dashboard read model.
//!
//! Loads every customer, area and contract of a year with their period
//! progress in a fixed number of queries: the three top-level lists are read
//! concurrently, then rosters, period rows and completions are read in bulk
//! by id and joined in memory through key → list maps.

use crate::{
    core::progress::{ContractProgress, YearlyStatus, group_by},
    entities::{
        Area, Contract, Customer, MonthlyProgress, Signature, SignatureProgress, area, contract,
        customer, monthly_progress, signature, signature_progress,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;

/// Upper bound on ids per `IN (...)` list.
const ID_CHUNK: usize = 500;

/// An area with its contracts for the year.
#[derive(Debug, Clone, Serialize)]
pub struct AreaDashboard {
    /// The area
    pub area: area::Model,
    /// Contracts of the area, by name
    pub contracts: Vec<ContractProgress>,
}

/// A customer with its areas.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDashboard {
    /// The customer
    pub customer: customer::Model,
    /// Areas of the customer, by name
    pub areas: Vec<AreaDashboard>,
}

/// Contract counts per yearly status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// All contracts of the year
    pub total_contracts: usize,
    /// Contracts with every period done
    pub completed: usize,
    /// Contracts with some progress
    pub in_progress: usize,
    /// Contracts without progress
    pub not_started: usize,
}

impl DashboardStats {
    /// Counts the contracts of a loaded dashboard by status.
    #[must_use]
    pub fn from_dashboard(dashboard: &[CustomerDashboard]) -> Self {
        let mut stats = Self::default();
        for contract in dashboard
            .iter()
            .flat_map(|c| &c.areas)
            .flat_map(|a| &a.contracts)
        {
            stats.total_contracts += 1;
            match contract.status {
                YearlyStatus::Completed => stats.completed += 1,
                YearlyStatus::InProgress => stats.in_progress += 1,
                YearlyStatus::NotStarted => stats.not_started += 1,
            }
        }
        stats
    }
}

/// Loads the full dashboard for `year`.
///
/// # Arguments
/// * `db` - Database connection
/// * `year` - Year whose contracts and progress are shown
///
/// # Returns
/// Every customer by name, each with all of its areas by name and the
/// area's contracts of `year` with their progress. Customers and areas
/// without contracts are included.
pub async fn load_dashboard(
    db: &DatabaseConnection,
    year: i32,
) -> Result<Vec<CustomerDashboard>> {
    let (customers, areas, contracts) = tokio::try_join!(
        Customer::find()
            .order_by_asc(customer::Column::Name)
            .all(db),
        Area::find().order_by_asc(area::Column::Name).all(db),
        Contract::find()
            .filter(contract::Column::Year.eq(year))
            .order_by_asc(contract::Column::Name)
            .all(db),
    )?;

    let progress = load_progress_for_contracts(db, contracts, year).await?;
    let mut contracts_by_area = group_by(progress, |p| p.contract.area_id);
    let mut areas_by_customer = group_by(areas, |a| a.customer_id);

    let dashboard: Vec<CustomerDashboard> = customers
        .into_iter()
        .map(|customer| {
            let areas = areas_by_customer
                .remove(&customer.id)
                .unwrap_or_default()
                .into_iter()
                .map(|area| AreaDashboard {
                    contracts: contracts_by_area.remove(&area.id).unwrap_or_default(),
                    area,
                })
                .collect();
            CustomerDashboard { customer, areas }
        })
        .collect();

    tracing::debug!(
        "Loaded dashboard for {year}: {} customers",
        dashboard.len()
    );
    Ok(dashboard)
}

/// Loads the progress of a single contract for `year`.
pub async fn load_contract_progress(
    db: &DatabaseConnection,
    contract_id: i64,
    year: i32,
) -> Result<ContractProgress> {
    let contract = crate::core::contract::get_contract(db, contract_id).await?;
    load_progress_for_contracts(db, vec![contract], year)
        .await?
        .pop()
        .ok_or(Error::ContractNotFound { id: contract_id })
}

/// Builds the progress of many contracts with bulk reads.
pub async fn load_progress_for_contracts(
    db: &DatabaseConnection,
    contracts: Vec<contract::Model>,
    year: i32,
) -> Result<Vec<ContractProgress>> {
    if contracts.is_empty() {
        return Ok(Vec::new());
    }

    let contract_ids: Vec<i64> = contracts.iter().map(|c| c.id).collect();
    let (signatures, rows) = tokio::try_join!(
        signatures_for(db, &contract_ids),
        period_rows_for(db, &contract_ids, year),
    )?;
    let row_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let completions = completions_for(db, &row_ids).await?;

    let mut signatures_by_contract = group_by(signatures, |s| s.contract_id);
    let mut rows_by_contract = group_by(rows, |r| r.contract_id);
    let mut completions_by_row = group_by(completions, |c| c.monthly_progress_id);

    Ok(contracts
        .into_iter()
        .map(|contract| {
            let signatures = signatures_by_contract
                .remove(&contract.id)
                .unwrap_or_default();
            let rows = rows_by_contract.remove(&contract.id).unwrap_or_default();
            let completions: Vec<signature_progress::Model> = rows
                .iter()
                .filter_map(|r| completions_by_row.remove(&r.id))
                .flatten()
                .collect();
            ContractProgress::build(contract, signatures, &rows, &completions)
        })
        .collect())
}

async fn signatures_for(
    db: &DatabaseConnection,
    contract_ids: &[i64],
) -> Result<Vec<signature::Model>> {
    let mut all = Vec::new();
    for chunk in contract_ids.chunks(ID_CHUNK) {
        let part = Signature::find()
            .filter(signature::Column::ContractId.is_in(chunk.to_vec()))
            .order_by_asc(signature::Column::Order)
            .all(db)
            .await?;
        all.extend(part);
    }
    Ok(all)
}

async fn period_rows_for(
    db: &DatabaseConnection,
    contract_ids: &[i64],
    year: i32,
) -> Result<Vec<monthly_progress::Model>> {
    let mut all = Vec::new();
    for chunk in contract_ids.chunks(ID_CHUNK) {
        let part = MonthlyProgress::find()
            .filter(monthly_progress::Column::ContractId.is_in(chunk.to_vec()))
            .filter(monthly_progress::Column::Year.eq(year))
            .all(db)
            .await?;
        all.extend(part);
    }
    Ok(all)
}

async fn completions_for(
    db: &DatabaseConnection,
    row_ids: &[i64],
) -> Result<Vec<signature_progress::Model>> {
    let mut all = Vec::new();
    for chunk in row_ids.chunks(ID_CHUNK) {
        let part = SignatureProgress::find()
            .filter(signature_progress::Column::MonthlyProgressId.is_in(chunk.to_vec()))
            .all(db)
            .await?;
        all.extend(part);
    }
    Ok(all)
}
