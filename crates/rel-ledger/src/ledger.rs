use std::sync::{Arc, Mutex};

use rel_fabric::EventFabric;
use rel_store::{split_composite_key, CommitRecord, StateStore, Transaction};
use rel_types::TemporalAnchor;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::history::{history_anchor, read_history, HistoryEntry, HISTORY_OBJECT_TYPE};
use crate::hlc::HybridLogicalClock;
use crate::unit::UnitOfWork;

/// Outcome of a committed unit of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    /// Commit sequence, or the unchanged store height for a read-only unit.
    pub seq: u64,
    pub tx_id: String,
    pub writes: usize,
    pub events: usize,
    pub history: Vec<HistoryEntry>,
}

/// The commit protocol between handlers, the state store, and the event fabric.
///
/// A commit runs in three steps under the ledger's commit lock:
///
/// 1. the fabric admits the staged events (any refusal aborts the unit),
/// 2. the store validates the read set and applies writes and events as one
///    commit record,
/// 3. the fabric delivers the events, tagged with the commit sequence.
///
/// Nothing is visible to readers or subscribers unless step 2 succeeds, and
/// subscribers observe events in commit order.
pub struct Ledger {
    store: Arc<dyn StateStore>,
    fabric: Arc<EventFabric>,
    clock: HybridLogicalClock,
    commit_lock: Mutex<()>,
}

impl Ledger {
    /// Create a ledger over `store`, advancing the clock past every history
    /// entry already committed so new history sorts after existing history.
    pub fn new(
        store: Arc<dyn StateStore>,
        fabric: Arc<EventFabric>,
        node_id: u16,
    ) -> LedgerResult<Self> {
        Self::with_clock(store, fabric, HybridLogicalClock::new(node_id))
    }

    pub fn with_clock(
        store: Arc<dyn StateStore>,
        fabric: Arc<EventFabric>,
        clock: HybridLogicalClock,
    ) -> LedgerResult<Self> {
        let node_id = clock.node_id();
        let commits = store.commits(1)?;
        if let Some(last) = commits.last() {
            clock.observe(&TemporalAnchor::new(last.committed_at_ms, 0, node_id));
        }
        // History IDs only grow, so the newest commit carrying history holds
        // the highest anchor.
        if let Some(anchor) = commits.iter().rev().find_map(newest_history_anchor) {
            clock.observe(&anchor);
        }
        let height = commits.len();
        info!(node_id, height, "ledger opened");
        Ok(Self {
            store,
            fabric,
            clock,
            commit_lock: Mutex::new(()),
        })
    }

    /// Begin a unit of work on behalf of `actor`.
    pub fn begin(&self, actor: &str) -> LedgerResult<UnitOfWork<'_>> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(LedgerError::MissingActor);
        }
        let txn = Transaction::new(self.store.clone(), Uuid::now_v7().to_string());
        Ok(UnitOfWork::new(&self.clock, txn, actor.to_string()))
    }

    /// Commit a unit of work atomically.
    pub fn commit(&self, unit: UnitOfWork<'_>) -> LedgerResult<CommitReceipt> {
        let (txn, history) = unit.into_parts();
        let batch = txn.into_batch()?;

        let _guard = self.commit_lock.lock().expect("commit lock poisoned");
        self.fabric.admit(&batch.events)?;
        let seq = self.store.commit(&batch)?;
        if !batch.is_read_only() {
            self.fabric.deliver(seq, &batch.tx_id, &batch.events);
            info!(
                seq,
                tx_id = %batch.tx_id,
                writes = batch.writes.len(),
                events = batch.events.len(),
                "unit of work committed"
            );
        } else {
            debug!(tx_id = %batch.tx_id, "read-only unit of work");
        }

        Ok(CommitReceipt {
            seq,
            tx_id: batch.tx_id,
            writes: batch.writes.len(),
            events: batch.events.len(),
            history,
        })
    }

    /// Committed history of an entity, in creation order.
    pub fn history(&self, entity_id: &str) -> LedgerResult<Vec<HistoryEntry>> {
        let snapshot = Transaction::new(self.store.clone(), "history-read");
        read_history(&snapshot, entity_id)
    }

    /// A read-only view of committed state.
    pub fn snapshot(&self) -> Transaction {
        Transaction::new(self.store.clone(), Uuid::now_v7().to_string())
    }

    /// Committed transaction log starting at `from_seq`.
    pub fn commits(&self, from_seq: u64) -> LedgerResult<Vec<CommitRecord>> {
        Ok(self.store.commits(from_seq)?)
    }

    pub fn height(&self) -> LedgerResult<u64> {
        Ok(self.store.height()?)
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn fabric(&self) -> &Arc<EventFabric> {
        &self.fabric
    }

    pub fn clock(&self) -> &HybridLogicalClock {
        &self.clock
    }
}

fn newest_history_anchor(record: &CommitRecord) -> Option<TemporalAnchor> {
    record
        .writes
        .iter()
        .filter_map(|write| {
            let (object_type, attributes) = split_composite_key(&write.key).ok()?;
            if object_type != HISTORY_OBJECT_TYPE {
                return None;
            }
            history_anchor(attributes.get(1)?)
        })
        .max()
}
