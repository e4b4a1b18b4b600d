//! Shared test utilities for the BAPP tracker.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        contract::{self, ContractWithSignatures, NewContract, NewSignature},
        customer,
        period::Cadence,
    },
    entities::{Area, Customer, area, customer as customer_entity, monthly_progress},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Year used by [`create_test_contract`].
pub const TEST_YEAR: i32 = 2025;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Returns the test customer "PT Test" and its area "Jakarta", creating them
/// on first use.
pub async fn create_test_customer_area(
    db: &DatabaseConnection,
) -> Result<(customer_entity::Model, area::Model)> {
    let customer = match Customer::find()
        .filter(customer_entity::Column::Name.eq("PT Test"))
        .one(db)
        .await?
    {
        Some(existing) => existing,
        None => customer::create_customer(db, "PT Test").await?,
    };

    let area = match Area::find()
        .filter(area::Column::CustomerId.eq(customer.id))
        .filter(area::Column::Name.eq("Jakarta"))
        .one(db)
        .await?
    {
        Some(existing) => existing,
        None => customer::create_area(db, customer.id, "Jakarta", "JKT").await?,
    };

    Ok((customer, area))
}

/// Creates a test contract in [`TEST_YEAR`].
///
/// # Defaults
/// * customer/area: "PT Test" / "Jakarta"
/// * `invoice_type`: "Reguler"
/// * roster: `steps` signers named "Signer 1", "Signer 2", ...
pub async fn create_test_contract(
    db: &DatabaseConnection,
    name: &str,
    cadence: Cadence,
    steps: usize,
) -> Result<ContractWithSignatures> {
    create_test_contract_in_year(db, name, cadence, steps, TEST_YEAR).await
}

/// Creates a test contract in a given year.
pub async fn create_test_contract_in_year(
    db: &DatabaseConnection,
    name: &str,
    cadence: Cadence,
    steps: usize,
    year: i32,
) -> Result<ContractWithSignatures> {
    let (customer, area) = create_test_customer_area(db).await?;
    contract::create_contract(
        db,
        NewContract {
            customer_id: customer.id,
            area_id: area.id,
            name: name.to_string(),
            cadence,
            invoice_type: "Reguler".to_string(),
            notes: None,
            year,
            signatures: (1..=steps)
                .map(|n| NewSignature {
                    name: format!("Signer {n}"),
                    role: format!("Role {n}"),
                })
                .collect(),
        },
    )
    .await
}

/// Inserts an empty period row without a sub-period, as older data has.
pub async fn insert_legacy_row(
    db: &DatabaseConnection,
    contract_id: i64,
    year: i32,
    month: i32,
) -> Result<monthly_progress::Model> {
    let row = monthly_progress::ActiveModel {
        contract_id: Set(contract_id),
        month: Set(month),
        year: Set(year),
        sub_period: Set(None),
        upload_link: Set(None),
        is_upload_completed: Set(false),
        notes: Set(None),
        notes_updated_at: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}
