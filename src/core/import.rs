//! Copies contract definitions and their sign-off rosters from one year into
//! another.
//!
//! Contracts are processed in batches; the contracts of one batch are copied
//! concurrently and the engine pauses between batches. Progress is never
//! copied. The engine does not fail as a whole: every contract ends up in
//! exactly one of the success, skipped or failed counters.

use crate::{
    config::settings::{DEFAULT_IMPORT_BATCH_DELAY_MS, DEFAULT_IMPORT_BATCH_SIZE, ImportConfig},
    core::contract::{find_duplicate, get_contract, get_signatures},
    entities::{Contract, Signature, contract, signature},
    errors::{Error, Result},
};
use futures::future::join_all;
use sea_orm::{Set, prelude::*};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Batching of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Contracts copied concurrently per batch
    pub batch_size: usize,
    /// Pause between two batches
    pub batch_delay: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_IMPORT_BATCH_DELAY_MS),
        }
    }
}

impl From<&ImportConfig> for ImportOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
        }
    }
}

/// Outcome counters of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Contracts created in the target year
    pub success: usize,
    /// Contracts that could not be copied
    pub failed: usize,
    /// Contracts already present in the target year
    pub skipped: usize,
    /// One readable message per failed contract
    pub errors: Vec<String>,
    /// Names of the skipped contracts
    pub skipped_names: Vec<String>,
}

enum Outcome {
    Imported,
    Skipped(String),
    Failed(String),
}

impl ImportResult {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Imported => self.success += 1,
            Outcome::Skipped(name) => {
                self.skipped += 1;
                self.skipped_names.push(name);
            }
            Outcome::Failed(message) => {
                self.failed += 1;
                self.errors.push(message);
            }
        }
    }
}

/// Copies the given contracts of `source_year` into `target_year`.
///
/// # Arguments
/// * `db` - Database connection
/// * `source_year` - Year the contracts are copied from
/// * `target_year` - Year the copies are created in
/// * `contract_ids` - Contracts to copy; repeated ids are imported once
/// * `options` - Batch size and pause between batches
///
/// # Returns
/// Counters of imported, skipped and failed contracts. A contract whose
/// customer, area, name and invoice type already exist in the target year is
/// skipped. Ids that do not exist or belong to another year are counted as
/// failed. Contracts of one batch sharing that key are copied one after
/// another, so at most one of them is created.
pub async fn import_contracts(
    db: &DatabaseConnection,
    source_year: i32,
    target_year: i32,
    contract_ids: &[i64],
    options: &ImportOptions,
) -> ImportResult {
    let mut seen = HashSet::new();
    let ids: Vec<i64> = contract_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let batch_size = options.batch_size.max(1);
    let batch_count = ids.len().div_ceil(batch_size);
    let mut result = ImportResult::default();

    info!(
        "Importing {} contracts from {source_year} into {target_year} in {batch_count} batches",
        ids.len()
    );

    for (index, batch) in ids.chunks(batch_size).enumerate() {
        if index > 0 && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }

        let groups = group_batch(db, batch).await;
        let outcomes = join_all(
            groups
                .iter()
                .map(|group| import_group(db, source_year, target_year, group)),
        )
        .await;
        for outcome in outcomes.into_iter().flatten() {
            result.record(outcome);
        }

        debug!("Import batch {}/{batch_count} done", index + 1);
    }

    info!(
        "Import into {target_year} finished: {} imported, {} skipped, {} failed",
        result.success, result.skipped, result.failed
    );
    result
}

/// Customer, area, name and invoice type: contracts sharing these are the
/// same contract in another year.
type DuplicateKey = (i64, i64, String, String);

/// Splits a batch into groups of ids sharing a duplicate key. Ids that cannot
/// be looked up get a group of their own.
async fn group_batch(db: &DatabaseConnection, batch: &[i64]) -> Vec<Vec<i64>> {
    let sources = match Contract::find()
        .filter(contract::Column::Id.is_in(batch.to_vec()))
        .all(db)
        .await
    {
        Ok(sources) => sources,
        Err(e) => {
            warn!("Could not group import batch, copying it sequentially: {e}");
            return vec![batch.to_vec()];
        }
    };

    let keys: HashMap<i64, DuplicateKey> = sources
        .into_iter()
        .map(|c| (c.id, (c.customer_id, c.area_id, c.name, c.invoice_type)))
        .collect();

    let mut groups: Vec<Vec<i64>> = Vec::new();
    let mut group_of_key: HashMap<&DuplicateKey, usize> = HashMap::new();
    for &id in batch {
        match keys.get(&id) {
            Some(key) => {
                let index = *group_of_key.entry(key).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[index].push(id);
            }
            None => groups.push(vec![id]),
        }
    }
    groups
}

async fn import_group(
    db: &DatabaseConnection,
    source_year: i32,
    target_year: i32,
    ids: &[i64],
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(ids.len());
    for &id in ids {
        outcomes.push(import_one(db, source_year, target_year, id).await);
    }
    outcomes
}

async fn import_one(db: &DatabaseConnection, source_year: i32, target_year: i32, id: i64) -> Outcome {
    match copy_contract(db, source_year, target_year, id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to import contract {id}: {e}");
            Outcome::Failed(format!("Kontrak #{id}: {}", e.user_message()))
        }
    }
}

async fn copy_contract(
    db: &DatabaseConnection,
    source_year: i32,
    target_year: i32,
    id: i64,
) -> Result<Outcome> {
    let source = get_contract(db, id).await?;
    if source.year != source_year {
        return Err(Error::Validation {
            message: format!("{} bukan kontrak tahun {source_year}", source.name),
        });
    }

    if let Some(existing) = find_duplicate(
        db,
        target_year,
        source.customer_id,
        source.area_id,
        &source.name,
        &source.invoice_type,
    )
    .await?
    {
        debug!(
            "Skipping contract {id}: already imported as {} in {target_year}",
            existing.id
        );
        return Ok(Outcome::Skipped(existing.name));
    }

    let signatures = get_signatures(db, id).await?;
    let created = contract::ActiveModel {
        customer_id: Set(source.customer_id),
        area_id: Set(source.area_id),
        name: Set(source.name),
        period: Set(source.period),
        invoice_type: Set(source.invoice_type),
        notes: Set(source.notes),
        year: Set(target_year),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // The contract stays imported even if its roster cannot be copied
    if let Err(e) = copy_signatures(db, created.id, &signatures).await {
        warn!(
            "Imported contract {} ({}) without its sign-off steps: {e}",
            created.id, created.name
        );
    }

    debug!("Imported contract {id} as {} in {target_year}", created.id);
    Ok(Outcome::Imported)
}

async fn copy_signatures(
    db: &DatabaseConnection,
    contract_id: i64,
    signatures: &[signature::Model],
) -> Result<()> {
    if signatures.is_empty() {
        return Ok(());
    }

    let copies = signatures.iter().map(|sig| signature::ActiveModel {
        contract_id: Set(contract_id),
        name: Set(sig.name.clone()),
        role: Set(sig.role.clone()),
        order: Set(sig.order),
        ..Default::default()
    });
    Signature::insert_many(copies).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contract::{get_contract_with_signatures, list_contracts_for_year};
    use crate::core::period::Cadence;
    use crate::core::tracking::{PeriodKey, set_step_completed, set_upload};
    use crate::entities::MonthlyProgress;
    use crate::test_utils::*;

    fn no_delay(batch_size: usize) -> ImportOptions {
        ImportOptions {
            batch_size,
            batch_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = ImportConfig {
            batch_size: 3,
            batch_delay_ms: 250,
        };
        let options = ImportOptions::from(&config);
        assert_eq!(options.batch_size, 3);
        assert_eq!(options.batch_delay, Duration::from_millis(250));

        let defaults = ImportOptions::default();
        assert_eq!(defaults.batch_size, 5);
        assert_eq!(defaults.batch_delay, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_import_copies_definition_and_roster() -> Result<()> {
        let db = setup_test_db().await?;
        let source = create_test_contract_in_year(&db, "Cleaning", Cadence::Quarterly, 3, 2024)
            .await?;
        let id = source.contract.id;
        set_step_completed(&db, PeriodKey::month(id, 2024, 3), source.signatures[0].id, true)
            .await?;
        set_upload(&db, PeriodKey::month(id, 2024, 3), None, true).await?;

        let result = import_contracts(&db, 2024, 2025, &[id], &no_delay(5)).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 0);

        let imported = list_contracts_for_year(&db, 2025).await?;
        assert_eq!(imported.len(), 1);
        let copy = get_contract_with_signatures(&db, imported[0].id).await?;
        assert_eq!(copy.contract.name, "Cleaning");
        assert_eq!(copy.contract.period, "Per 3 Bulan");
        assert_eq!(copy.contract.invoice_type, source.contract.invoice_type);
        assert_eq!(copy.contract.customer_id, source.contract.customer_id);

        let roster = |sigs: &[signature::Model]| {
            sigs.iter()
                .map(|s| (s.name.clone(), s.role.clone(), s.order))
                .collect::<Vec<_>>()
        };
        assert_eq!(roster(&copy.signatures), roster(&source.signatures));

        let rows = MonthlyProgress::find()
            .filter(crate::entities::monthly_progress::Column::ContractId.eq(copy.contract.id))
            .count(&db)
            .await?;
        assert_eq!(rows, 0, "progress is not copied");
        Ok(())
    }

    #[tokio::test]
    async fn test_import_skips_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        let source = create_test_contract_in_year(&db, "Cleaning", Cadence::Monthly, 2, 2024)
            .await?;
        let existing = create_test_contract_in_year(&db, "Cleaning", Cadence::Annual, 0, 2025)
            .await?;

        let result = import_contracts(&db, 2024, 2025, &[source.contract.id], &no_delay(5)).await;
        assert_eq!(result.skipped, 1);
        assert_eq!(result.success, 0);
        assert_eq!(result.skipped_names, vec!["Cleaning".to_string()]);

        let untouched = get_contract_with_signatures(&db, existing.contract.id).await?;
        assert_eq!(untouched.contract.period, "Per 12 Bulan");
        assert!(untouched.signatures.is_empty());
        assert_eq!(list_contracts_for_year(&db, 2025).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_counts_failures() -> Result<()> {
        let db = setup_test_db().await?;
        let good = create_test_contract_in_year(&db, "Cleaning", Cadence::Monthly, 1, 2024).await?;
        let other_year =
            create_test_contract_in_year(&db, "Security", Cadence::Monthly, 1, 2023).await?;

        let ids = [good.contract.id, 999, other_year.contract.id];
        let result = import_contracts(&db, 2024, 2025, &ids, &no_delay(2)).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().any(|e| e.contains("#999")));
        assert_eq!(list_contracts_for_year(&db, 2025).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_in_several_batches() -> Result<()> {
        let db = setup_test_db().await?;
        let mut ids = Vec::new();
        for n in 0..7 {
            let created =
                create_test_contract_in_year(&db, &format!("Contract {n}"), Cadence::Monthly, 2, 2024)
                    .await?;
            ids.push(created.contract.id);
        }

        let result = import_contracts(&db, 2024, 2025, &ids, &no_delay(3)).await;
        assert_eq!(result.success, 7);
        assert_eq!(list_contracts_for_year(&db, 2025).await?.len(), 7);

        // Running it again skips everything
        let again = import_contracts(&db, 2024, 2025, &ids, &no_delay(3)).await;
        assert_eq!(again.skipped, 7);
        assert_eq!(again.success, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_repeated_id_copies_once() -> Result<()> {
        let db = setup_test_db().await?;
        let source = create_test_contract_in_year(&db, "Cleaning", Cadence::Monthly, 2, 2024)
            .await?;
        let id = source.contract.id;

        let result = import_contracts(&db, 2024, 2025, &[id, id], &no_delay(5)).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(list_contracts_for_year(&db, 2025).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_same_key_in_one_batch_skips_the_second() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_contract_in_year(&db, "Cleaning", Cadence::Monthly, 2, 2024)
            .await?;
        let second = create_test_contract_in_year(&db, "Cleaning", Cadence::Quarterly, 1, 2024)
            .await?;
        let other = create_test_contract_in_year(&db, "Security", Cadence::Monthly, 1, 2024)
            .await?;

        let ids = [first.contract.id, other.contract.id, second.contract.id];
        let result = import_contracts(&db, 2024, 2025, &ids, &no_delay(5)).await;
        assert_eq!(result.success, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.skipped_names, vec!["Cleaning".to_string()]);

        let imported = list_contracts_for_year(&db, 2025).await?;
        let names: Vec<&str> = imported.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cleaning", "Security"]);
        // The first id in the batch wins
        assert_eq!(imported[0].period, "Per 1 Bulan");
        Ok(())
    }

    #[tokio::test]
    async fn test_roster_copy_failure_keeps_contract() -> Result<()> {
        let db = setup_test_db().await?;
        let source = create_test_contract_in_year(&db, "Cleaning", Cadence::Monthly, 3, 2024)
            .await?;

        db.execute_unprepared(
            "CREATE TRIGGER block_signature_insert BEFORE INSERT ON signatures \
             BEGIN SELECT RAISE(ABORT, 'roster locked'); END;",
        )
        .await?;

        let result =
            import_contracts(&db, 2024, 2025, &[source.contract.id], &no_delay(5)).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 0);
        assert!(result.errors.is_empty());

        let imported = list_contracts_for_year(&db, 2025).await?;
        assert_eq!(imported.len(), 1);
        let copy = get_contract_with_signatures(&db, imported[0].id).await?;
        assert_eq!(copy.contract.name, "Cleaning");
        assert!(copy.signatures.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_import_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let result = import_contracts(&db, 2024, 2025, &[], &ImportOptions::default()).await;
        assert_eq!(result, ImportResult::default());
        Ok(())
    }
}
