use std::collections::BTreeMap;

use rel_fabric::{ChangeEvent, EventName};
use rel_store::{ScanCursor, Transaction};
use rel_types::{ChangeType, EntityType, TemporalAnchor};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::LedgerResult;
use crate::history::{read_history, FieldChange, HistoryEntry, HistoryRecorder};
use crate::hlc::HybridLogicalClock;

/// The atomic scope of one invocation.
///
/// State writes, history entries, and staged events all live in the same
/// [`Transaction`] and reach the store as one commit record, or not at all.
pub struct UnitOfWork<'a> {
    clock: &'a HybridLogicalClock,
    txn: Transaction,
    actor: String,
    anchor: TemporalAnchor,
    timestamp: String,
    recorded: Vec<HistoryEntry>,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(clock: &'a HybridLogicalClock, txn: Transaction, actor: String) -> Self {
        let anchor = clock.now();
        let timestamp = anchor.rfc3339();
        Self {
            clock,
            txn,
            actor,
            anchor,
            timestamp,
            recorded: Vec::new(),
        }
    }

    /// Identity performing the invocation.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn tx_id(&self) -> &str {
        self.txn.tx_id()
    }

    /// RFC 3339 timestamp shared by every record this unit writes.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn anchor(&self) -> TemporalAnchor {
        self.anchor
    }

    /// The underlying transaction, for read-only access.
    pub fn txn(&self) -> &Transaction {
        &self.txn
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> LedgerResult<Option<T>> {
        Ok(self.txn.get_json(key)?)
    }

    pub fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> LedgerResult<()> {
        Ok(self.txn.put_json(key, value)?)
    }

    pub fn exists(&self, key: &str) -> LedgerResult<bool> {
        Ok(self.txn.exists(key)?)
    }

    pub fn delete(&mut self, key: &str) -> LedgerResult<()> {
        Ok(self.txn.delete(key)?)
    }

    pub fn scan_prefix(&self, object_type: &str, attributes: &[&str]) -> LedgerResult<ScanCursor<'_>> {
        Ok(self.txn.scan_prefix(object_type, attributes)?)
    }

    /// Append one history entry for `change`.
    pub fn record(
        &mut self,
        entity_id: &str,
        entity_type: EntityType,
        change_type: ChangeType,
        change: FieldChange,
    ) -> LedgerResult<HistoryEntry> {
        let entry = HistoryRecorder::new(self.clock).record(
            &mut self.txn,
            entity_id,
            entity_type,
            change_type,
            change,
            &self.actor,
            &self.timestamp,
        )?;
        self.recorded.push(entry.clone());
        Ok(entry)
    }

    /// Build a change event stamped with this unit's actor and timestamp and
    /// stage it for commit.
    pub fn emit<T: Serialize>(
        &mut self,
        name: EventName,
        entity_id: &str,
        entity_type: EntityType,
        data: &T,
        metadata: BTreeMap<String, String>,
    ) -> LedgerResult<ChangeEvent> {
        let event = ChangeEvent::build(
            name,
            entity_id,
            entity_type,
            self.actor.clone(),
            self.timestamp.clone(),
            data,
            metadata,
        )?;
        self.txn.stage_event(event.to_record()?);
        Ok(event)
    }

    /// History of an entity as this unit currently sees it.
    pub fn history(&self, entity_id: &str) -> LedgerResult<Vec<HistoryEntry>> {
        read_history(&self.txn, entity_id)
    }

    /// Entries recorded by this unit so far.
    pub fn recorded(&self) -> &[HistoryEntry] {
        &self.recorded
    }

    pub(crate) fn into_parts(self) -> (Transaction, Vec<HistoryEntry>) {
        (self.txn, self.recorded)
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("tx_id", &self.txn.tx_id())
            .field("actor", &self.actor)
            .field("timestamp", &self.timestamp)
            .field("recorded", &self.recorded.len())
            .finish()
    }
}
