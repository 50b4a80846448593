//! Domain handlers.
//!
//! Every write handler runs inside one [`UnitOfWork`](rel_ledger::UnitOfWork):
//! it loads what it needs, validates the change, writes the new revision and
//! its index entries, records one history entry per changed field, and stages
//! one change event. The caller commits the unit; a handler error drops it
//! and nothing is written.

pub mod compliance;
pub mod customer;
pub mod loan;
pub mod query;

use std::collections::BTreeMap;

use rel_lifecycle::GraphRegistry;
use rel_store::Transaction;
use rel_types::{IdGenerator, StatusValue};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::Entity;

/// Read-only state shared by every handler.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub registry: &'a GraphRegistry,
    pub config: &'a EngineConfig,
}

/// Check that `id` is a well-formed identifier for `T`.
pub(crate) fn check_id<T: Entity>(id: &str) -> EngineResult<()> {
    IdGenerator::validate(id, T::TYPE.id_prefix())
        .map_err(|e| EngineError::input(e.to_string()))
}

/// Load the primary record of `T` with `id`.
pub(crate) fn load<T: Entity>(txn: &Transaction, id: &str) -> EngineResult<T> {
    check_id::<T>(id)?;
    txn.get_json(&T::TYPE.primary_key(id))?
        .ok_or_else(|| EngineError::not_found(T::TYPE, id))
}

/// Validate `current -> requested` against the type's graph and return the
/// parsed target status.
pub(crate) fn transition<S: StatusValue>(
    registry: &GraphRegistry,
    current: S,
    requested: &str,
) -> EngineResult<S> {
    registry.validate(S::ENTITY.as_str(), current.as_str(), requested)?;
    requested
        .parse()
        .map_err(|e: rel_types::TypeError| EngineError::input(e.to_string()))
}

/// Event metadata from key/value pairs.
pub(crate) fn metadata<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// JSON snapshot recorded as the value of a CREATE entry.
pub(crate) fn snapshot<T: Entity>(entity: &T) -> EngineResult<String> {
    serde_json::to_string(entity).map_err(|e| EngineError::Persistence(e.to_string()))
}

/// Two-decimal rendering used for money and rates in history and metadata.
pub(crate) fn money(value: f64) -> String {
    format!("{value:.2}")
}
