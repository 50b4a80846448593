use rel_store::{composite_key, Transaction};
use rel_types::{ChangeType, EntityType, IdGenerator, TemporalAnchor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::hlc::HybridLogicalClock;

/// Object type of history composite keys.
pub const HISTORY_OBJECT_TYPE: &str = "HISTORY";

/// Identifier prefix of history entries.
pub const HISTORY_ID_PREFIX: &str = "HIST";

/// One immutable field-level audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(rename = "historyID")]
    pub history_id: String,
    #[serde(rename = "entityID")]
    pub entity_id: String,
    pub entity_type: EntityType,
    /// RFC 3339 timestamp of the unit of work.
    pub timestamp: String,
    pub change_type: ChangeType,
    pub field_name: String,
    pub previous_value: String,
    pub new_value: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
}

/// The field, old value, and new value of one change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub previous: String,
    pub new: String,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, previous: impl ToString, new: impl ToString) -> Self {
        Self {
            field: field.into(),
            previous: previous.to_string(),
            new: new.to_string(),
        }
    }

    /// Change of a field that had no previous value.
    pub fn created(field: impl Into<String>, new: impl ToString) -> Self {
        Self::new(field, "", new)
    }
}

/// Key of one history entry: `compositeKey("HISTORY", [entityID, historyID])`.
pub fn history_key(entity_id: &str, history_id: &str) -> LedgerResult<String> {
    Ok(composite_key(HISTORY_OBJECT_TYPE, &[entity_id, history_id])?)
}

/// The clock anchor a history ID was generated from.
pub fn history_anchor(history_id: &str) -> Option<TemporalAnchor> {
    let (sort_key, _hash) = history_id
        .strip_prefix(HISTORY_ID_PREFIX)?
        .strip_prefix('_')?
        .rsplit_once('_')?;
    TemporalAnchor::from_sort_key(sort_key)
}

/// Writes history entries into a transaction.
///
/// History IDs take their timestamp component from the ledger clock, so a
/// prefix scan over one entity's history yields creation order.
pub struct HistoryRecorder<'a> {
    clock: &'a HybridLogicalClock,
}

impl<'a> HistoryRecorder<'a> {
    pub fn new(clock: &'a HybridLogicalClock) -> Self {
        Self { clock }
    }

    /// Build an entry for `change` and buffer it in `txn`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        txn: &mut Transaction,
        entity_id: &str,
        entity_type: EntityType,
        change_type: ChangeType,
        change: FieldChange,
        actor_id: &str,
        timestamp: &str,
    ) -> LedgerResult<HistoryEntry> {
        let history_id = IdGenerator::generate_ordered(HISTORY_ID_PREFIX, &self.clock.now());
        let entry = HistoryEntry {
            history_id,
            entity_id: entity_id.to_string(),
            entity_type,
            timestamp: timestamp.to_string(),
            change_type,
            field_name: change.field,
            previous_value: change.previous,
            new_value: change.new,
            actor_id: actor_id.to_string(),
            transaction_id: txn.tx_id().to_string(),
        };

        let key = history_key(&entry.entity_id, &entry.history_id)?;
        txn.put_json(&key, &entry)?;
        debug!(
            entity_id,
            history_id = %entry.history_id,
            change_type = %change_type,
            field = %entry.field_name,
            "history recorded"
        );
        Ok(entry)
    }
}

/// Every history entry of one entity, in creation order.
pub fn read_history(txn: &Transaction, entity_id: &str) -> LedgerResult<Vec<HistoryEntry>> {
    txn.scan_prefix(HISTORY_OBJECT_TYPE, &[entity_id])?
        .map(|(key, bytes)| {
            serde_json::from_slice(&bytes).map_err(|e| LedgerError::MalformedHistory {
                key,
                reason: e.to_string(),
            })
        })
        .collect()
}
