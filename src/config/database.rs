//! Database configuration module for the BAPP tracker.
//!
//! This module handles database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The composite uniqueness rules of the progress tables are added as
//! separate unique indexes.

use crate::entities::{
    Area, Contract, Customer, MonthlyProgress, Profile, Signature, SignatureProgress,
    monthly_progress, signature_progress,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;

/// Fallback used when neither the environment nor config.toml names a database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/bapp_tracker.sqlite?mode=rwc";

/// Resolves the database URL.
///
/// `DATABASE_URL` from the environment wins, then the value from config.toml,
/// then [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(ToString::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
///
/// For a file-backed `SQLite` URL the parent directory is created first.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(parent) = sqlite_file_parent(database_url) {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!("Connecting to database at {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

fn sqlite_file_parent(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}

/// Creates all tables and unique indexes, skipping any that already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = vec![
        schema.create_table_from_entity(Customer),
        schema.create_table_from_entity(Area),
        schema.create_table_from_entity(Contract),
        schema.create_table_from_entity(Signature),
        schema.create_table_from_entity(MonthlyProgress),
        schema.create_table_from_entity(SignatureProgress),
        schema.create_table_from_entity(Profile),
    ];
    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    // One row per (contract, year, month, sub_period)
    let period_index = Index::create()
        .name("idx_monthly_progress_period")
        .table(MonthlyProgress)
        .col(monthly_progress::Column::ContractId)
        .col(monthly_progress::Column::Year)
        .col(monthly_progress::Column::Month)
        .col(monthly_progress::Column::SubPeriod)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&period_index)).await?;

    // One completion per (period row, step)
    let completion_index = Index::create()
        .name("idx_signature_progress_pair")
        .table(SignatureProgress)
        .col(signature_progress::Column::MonthlyProgressId)
        .col(signature_progress::Column::SignatureId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&completion_index)).await?;

    Ok(())
}
