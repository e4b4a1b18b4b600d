//! Contract and sign-off roster management.
//!
//! Contracts are created together with their initial roster. The roster is
//! kept densely ranked (1, 2, 3, ...) whenever it is edited. Deleting a
//! contract removes its roster, period rows and step completions.

use crate::{
    core::{customer::required, period::Cadence},
    entities::{
        Contract, MonthlyProgress, Signature, SignatureProgress, contract, monthly_progress,
        signature, signature_progress,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One sign-off step of a roster being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSignature {
    /// Signer name
    pub name: String,
    /// Signer role
    pub role: String,
}

/// Input for [`create_contract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
    /// Owning customer
    pub customer_id: i64,
    /// Covered area
    pub area_id: i64,
    /// Contract name
    pub name: String,
    /// Reporting cadence
    pub cadence: Cadence,
    /// Invoice type label
    pub invoice_type: String,
    /// Free-text notes
    pub notes: Option<String>,
    /// Year the contract is tracked in
    pub year: i32,
    /// Initial roster, in order
    pub signatures: Vec<NewSignature>,
}

/// Editable contract fields. The cadence changes only through
/// [`crate::core::migration::migrate_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDetails {
    /// Contract name
    pub name: String,
    /// Invoice type label
    pub invoice_type: String,
    /// Free-text notes
    pub notes: Option<String>,
}

/// One entry of an edited roster; `id` is `None` for a new step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInput {
    /// Existing step id
    pub id: Option<i64>,
    /// Signer name
    pub name: String,
    /// Signer role
    pub role: String,
}

/// A contract with its roster in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct ContractWithSignatures {
    /// The contract
    pub contract: contract::Model,
    /// Its sign-off steps, ordered by rank
    pub signatures: Vec<signature::Model>,
}

/// Creates a contract and its initial roster in one transaction.
pub async fn create_contract(
    db: &DatabaseConnection,
    input: NewContract,
) -> Result<ContractWithSignatures> {
    let name = required("Contract name", &input.name)?;
    let invoice_type = required("Invoice type", &input.invoice_type)?;
    for sig in &input.signatures {
        required("Signer name", &sig.name)?;
    }

    let txn = db.begin().await?;

    let contract = contract::ActiveModel {
        customer_id: Set(input.customer_id),
        area_id: Set(input.area_id),
        name: Set(name),
        period: Set(input.cadence.label()),
        invoice_type: Set(invoice_type),
        notes: Set(input.notes),
        year: Set(input.year),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut signatures = Vec::with_capacity(input.signatures.len());
    for (order, sig) in (1..).zip(&input.signatures) {
        let created = signature::ActiveModel {
            contract_id: Set(contract.id),
            name: Set(sig.name.trim().to_string()),
            role: Set(sig.role.trim().to_string()),
            order: Set(order),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        signatures.push(created);
    }

    txn.commit().await?;

    tracing::info!(
        "Created contract {} ({}) with {} sign-off steps",
        contract.id,
        contract.name,
        signatures.len()
    );

    Ok(ContractWithSignatures {
        contract,
        signatures,
    })
}

/// Fetches a contract, failing with [`Error::ContractNotFound`] if missing.
pub async fn get_contract<C>(db: &C, contract_id: i64) -> Result<contract::Model>
where
    C: ConnectionTrait,
{
    Contract::find_by_id(contract_id)
        .one(db)
        .await?
        .ok_or(Error::ContractNotFound { id: contract_id })
}

/// The roster of a contract, ordered by rank.
pub async fn get_signatures<C>(db: &C, contract_id: i64) -> Result<Vec<signature::Model>>
where
    C: ConnectionTrait,
{
    Signature::find()
        .filter(signature::Column::ContractId.eq(contract_id))
        .order_by_asc(signature::Column::Order)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A contract together with its ordered roster.
pub async fn get_contract_with_signatures<C>(
    db: &C,
    contract_id: i64,
) -> Result<ContractWithSignatures>
where
    C: ConnectionTrait,
{
    let contract = get_contract(db, contract_id).await?;
    let signatures = get_signatures(db, contract_id).await?;
    Ok(ContractWithSignatures {
        contract,
        signatures,
    })
}

/// All contracts tracked in `year`, ordered by name.
pub async fn list_contracts_for_year(
    db: &DatabaseConnection,
    year: i32,
) -> Result<Vec<contract::Model>> {
    Contract::find()
        .filter(contract::Column::Year.eq(year))
        .order_by_asc(contract::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates the name, invoice type and notes of a contract.
pub async fn update_contract_details(
    db: &DatabaseConnection,
    contract_id: i64,
    details: ContractDetails,
) -> Result<contract::Model> {
    let name = required("Contract name", &details.name)?;
    let invoice_type = required("Invoice type", &details.invoice_type)?;
    let existing = get_contract(db, contract_id).await?;

    let mut active: contract::ActiveModel = existing.into();
    active.name = Set(name);
    active.invoice_type = Set(invoice_type);
    active.notes = Set(details.notes);
    Ok(active.update(db).await?)
}

/// Replaces the roster of a contract.
///
/// Steps are ranked by their position in `roster`. Existing steps named by id
/// are updated in place and keep their completions; steps missing from
/// `roster` are deleted together with their completions; entries without an
/// id are inserted.
pub async fn replace_signatures(
    db: &DatabaseConnection,
    contract_id: i64,
    roster: Vec<SignatureInput>,
) -> Result<Vec<signature::Model>> {
    for entry in &roster {
        required("Signer name", &entry.name)?;
    }

    let txn = db.begin().await?;
    get_contract(&txn, contract_id).await?;

    let mut existing: HashMap<i64, signature::Model> = get_signatures(&txn, contract_id)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut kept = Vec::with_capacity(roster.len());
    for (order, entry) in (1..).zip(roster) {
        let name = entry.name.trim().to_string();
        let role = entry.role.trim().to_string();
        let saved = match entry.id {
            Some(id) => {
                let current = existing.remove(&id).ok_or_else(|| Error::Validation {
                    message: format!("Sign-off step {id} does not belong to contract {contract_id}"),
                })?;
                let mut active: signature::ActiveModel = current.into();
                active.name = Set(name);
                active.role = Set(role);
                active.order = Set(order);
                active.update(&txn).await?
            }
            None => {
                signature::ActiveModel {
                    contract_id: Set(contract_id),
                    name: Set(name),
                    role: Set(role),
                    order: Set(order),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };
        kept.push(saved);
    }

    let removed: Vec<i64> = existing.into_keys().collect();
    if !removed.is_empty() {
        SignatureProgress::delete_many()
            .filter(signature_progress::Column::SignatureId.is_in(removed.clone()))
            .exec(&txn)
            .await?;
        Signature::delete_many()
            .filter(signature::Column::Id.is_in(removed.clone()))
            .exec(&txn)
            .await?;
        tracing::debug!("Removed sign-off steps {removed:?} from contract {contract_id}");
    }

    txn.commit().await?;
    Ok(kept)
}

/// Deletes a contract with its roster, period rows and completions.
pub async fn delete_contract(db: &DatabaseConnection, contract_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    get_contract(&txn, contract_id).await?;

    let row_ids: Vec<i64> = MonthlyProgress::find()
        .select_only()
        .column(monthly_progress::Column::Id)
        .filter(monthly_progress::Column::ContractId.eq(contract_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !row_ids.is_empty() {
        SignatureProgress::delete_many()
            .filter(signature_progress::Column::MonthlyProgressId.is_in(row_ids))
            .exec(&txn)
            .await?;
    }
    MonthlyProgress::delete_many()
        .filter(monthly_progress::Column::ContractId.eq(contract_id))
        .exec(&txn)
        .await?;
    Signature::delete_many()
        .filter(signature::Column::ContractId.eq(contract_id))
        .exec(&txn)
        .await?;
    Contract::delete_by_id(contract_id).exec(&txn).await?;

    txn.commit().await?;
    tracing::info!("Deleted contract {contract_id}");
    Ok(())
}

/// Finds a contract in `year` with the same customer, area, name and
/// invoice type.
pub async fn find_duplicate<C>(
    db: &C,
    year: i32,
    customer_id: i64,
    area_id: i64,
    name: &str,
    invoice_type: &str,
) -> Result<Option<contract::Model>>
where
    C: ConnectionTrait,
{
    Contract::find()
        .filter(contract::Column::Year.eq(year))
        .filter(contract::Column::CustomerId.eq(customer_id))
        .filter(contract::Column::AreaId.eq(area_id))
        .filter(contract::Column::Name.eq(name))
        .filter(contract::Column::InvoiceType.eq(invoice_type))
        .one(db)
        .await
        .map_err(Into::into)
}
