//! Read-only handlers. They run against a committed-state snapshot and
//! never open a unit of work.

use rel_ledger::{read_history, HistoryEntry};
use rel_store::Transaction;
use rel_types::{EntityType, IdGenerator, StatusValue};
use tracing::warn;

use super::{check_id, load};
use crate::error::{EngineError, EngineResult};
use crate::index;
use crate::model::{Customer, Entity};

pub fn get<T: Entity>(txn: &Transaction, id: &str) -> EngineResult<T> {
    load(txn, id.trim())
}

/// Every `T` whose stored status is `status`, in index key order.
///
/// Index entries that disagree with the primary record's status are skipped.
pub fn by_status<T: Entity>(txn: &Transaction, status: &str) -> EngineResult<Vec<T>> {
    let status: T::Status = status
        .trim()
        .parse()
        .map_err(|e: rel_types::TypeError| EngineError::input(e.to_string()))?;

    let mut matching = index::resolve::<T>(txn, index::status_index(T::TYPE), &[status.as_str()])?;
    matching.retain(|entity| {
        let current = entity.status() == status;
        if !current {
            warn!(
                entity_id = entity.id(),
                indexed = status.as_str(),
                stored = entity.status_str(),
                "skipping stale status index entry"
            );
        }
        current
    });
    Ok(matching)
}

/// Every `T` indexed under `customer_id`, skipping dangling entries.
pub fn by_customer<T: Entity>(txn: &Transaction, customer_id: &str) -> EngineResult<Vec<T>> {
    let customer_id = customer_id.trim();
    check_id::<Customer>(customer_id)?;
    let owner_index = index::owner_index(T::TYPE)
        .ok_or_else(|| EngineError::input(format!("{} has no owner index", T::TYPE)))?;
    index::resolve(txn, owner_index, &[customer_id])
}

/// Creation-ordered history of any entity.
///
/// Fails with `NotFound` only when the entity has neither a primary record
/// nor any history.
pub fn history(txn: &Transaction, entity_id: &str) -> EngineResult<Vec<HistoryEntry>> {
    let entity_id = entity_id.trim();
    let entity_type = EntityType::from_id(entity_id)
        .ok_or_else(|| EngineError::input(format!("{entity_id:?} is not an entity ID")))?;
    IdGenerator::validate(entity_id, entity_type.id_prefix())
        .map_err(|e| EngineError::input(e.to_string()))?;

    let entries = read_history(txn, entity_id)?;
    if entries.is_empty() && !txn.exists(&entity_type.primary_key(entity_id))? {
        return Err(EngineError::not_found(entity_type, entity_id));
    }
    Ok(entries)
}
