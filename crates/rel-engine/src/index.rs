//! Secondary indexes over the primary records.
//!
//! Owner indexes map `(OWNER_INDEX, [customerID, entityID])` and status
//! indexes map `(STATUS_INDEX, [status, entityID])` to the entity ID. Both are
//! written in the same unit of work as the primary record. Readers resolve
//! each entry back to its primary and skip entries whose primary is gone.

use rel_ledger::UnitOfWork;
use rel_store::{composite_key, split_composite_key, Transaction};
use rel_types::EntityType;
use tracing::warn;

use crate::error::EngineResult;
use crate::model::Entity;

pub const LOAN_BY_CUSTOMER: &str = "LOAN_BY_CUSTOMER";
pub const CASE_BY_CUSTOMER: &str = "CASE_BY_CUSTOMER";
pub const LOAN_BY_STATUS: &str = "LOAN_BY_STATUS";
pub const CUSTOMER_BY_STATUS: &str = "CUSTOMER_BY_STATUS";
pub const CASE_BY_STATUS: &str = "CASE_BY_STATUS";

/// Owner index for entities that belong to a customer.
pub fn owner_index(entity_type: EntityType) -> Option<&'static str> {
    match entity_type {
        EntityType::Loan => Some(LOAN_BY_CUSTOMER),
        EntityType::ComplianceCase => Some(CASE_BY_CUSTOMER),
        EntityType::Customer => None,
    }
}

pub fn status_index(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Loan => LOAN_BY_STATUS,
        EntityType::Customer => CUSTOMER_BY_STATUS,
        EntityType::ComplianceCase => CASE_BY_STATUS,
    }
}

/// Index `entity_id` under `owner_id`.
pub fn put_owner(
    unit: &mut UnitOfWork<'_>,
    index: &str,
    owner_id: &str,
    entity_id: &str,
) -> EngineResult<()> {
    let key = composite_key(index, &[owner_id, entity_id])?;
    unit.put_json(&key, &entity_id)?;
    Ok(())
}

/// Index a newly created entity under its status.
pub fn put_status<T: Entity>(unit: &mut UnitOfWork<'_>, entity: &T) -> EngineResult<()> {
    let key = composite_key(status_index(T::TYPE), &[entity.status_str(), entity.id()])?;
    unit.put_json(&key, &entity.id())?;
    Ok(())
}

/// Move an entity's status index entry from `previous` to its current status.
pub fn move_status<T: Entity>(
    unit: &mut UnitOfWork<'_>,
    entity: &T,
    previous: &str,
) -> EngineResult<()> {
    let index = status_index(T::TYPE);
    unit.delete(&composite_key(index, &[previous, entity.id()])?)?;
    put_status(unit, entity)
}

/// Load every primary record listed under `(index, attributes)`, in key order.
///
/// Entries whose primary record no longer exists are skipped.
pub fn resolve<T: Entity>(
    txn: &Transaction,
    index: &str,
    attributes: &[&str],
) -> EngineResult<Vec<T>> {
    let mut found = Vec::new();
    for (key, _) in txn.scan_prefix(index, attributes)? {
        let entity_id = match split_composite_key(&key)?.1.pop() {
            Some(id) => id,
            None => {
                warn!(index, key = %key.escape_debug(), "index entry without entity id");
                continue;
            }
        };
        match txn.get_json::<T>(&T::TYPE.primary_key(&entity_id))? {
            Some(entity) => found.push(entity),
            None => warn!(index, entity_id = %entity_id, "skipping dangling index entry"),
        }
    }
    Ok(found)
}
