use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::keys::{check_simple_key, composite_key};
use crate::record::{CommitBatch, EventRecord, RangeRead, ReadVersion, Write, WriteOp};
use crate::traits::StateStore;

/// One unit of work against a [`StateStore`].
///
/// Reads see committed state overlaid with this transaction's own buffered
/// writes. The first committed version observed for each key, and the exact
/// contents of each committed range scanned, are recorded so the store can
/// reject the commit if any of them moved in the meantime.
pub struct Transaction {
    store: Arc<dyn StateStore>,
    tx_id: String,
    reads: RefCell<BTreeMap<String, Option<u64>>>,
    range_reads: RefCell<Vec<RangeRead>>,
    writes: BTreeMap<String, WriteOp>,
    events: Vec<EventRecord>,
    open_cursors: Cell<usize>,
}

impl Transaction {
    pub fn new(store: Arc<dyn StateStore>, tx_id: impl Into<String>) -> Self {
        Self {
            store,
            tx_id: tx_id.into(),
            reads: RefCell::new(BTreeMap::new()),
            range_reads: RefCell::new(Vec::new()),
            writes: BTreeMap::new(),
            events: Vec::new(),
            open_cursors: Cell::new(0),
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Read a key. Returns `Ok(None)` if it does not exist (or was deleted
    /// earlier in this transaction).
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_simple_key(key)?;
        if let Some(op) = self.writes.get(key) {
            return Ok(match op {
                WriteOp::Put(value) => Some(value.clone()),
                WriteOp::Delete => None,
            });
        }

        let committed = self.store.get(key)?;
        self.reads
            .borrow_mut()
            .entry(key.to_string())
            .or_insert_with(|| committed.as_ref().map(|v| v.version));
        Ok(committed.map(|v| v.value))
    }

    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Buffer a put. Empty values are rejected; use [`delete`](Self::delete).
    pub fn put(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        check_simple_key(key)?;
        if value.is_empty() {
            return Err(StoreError::EmptyValue(key.to_string()));
        }
        self.writes.insert(key.to_string(), WriteOp::Put(value));
        Ok(())
    }

    /// Buffer a delete.
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        check_simple_key(key)?;
        self.writes.insert(key.to_string(), WriteOp::Delete);
        Ok(())
    }

    /// Read and decode a JSON value.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        self.get(key)?
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Encode a value as JSON and buffer it.
    pub fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.put(key, bytes)
    }

    /// Open a cursor over every key under `composite_key(object_type, attributes)`.
    ///
    /// Entries come back in lexicographic key order and reflect this
    /// transaction's buffered writes. The cursor borrows the transaction, so
    /// no write can be buffered while it is open.
    pub fn scan_prefix(&self, object_type: &str, attributes: &[&str]) -> StoreResult<ScanCursor<'_>> {
        let prefix = composite_key(object_type, attributes)?;
        let committed = self.store.scan_prefix(&prefix)?;

        self.range_reads.borrow_mut().push(RangeRead {
            prefix: prefix.clone(),
            observed: committed
                .iter()
                .map(|(key, value)| (key.clone(), value.version))
                .collect(),
        });

        let mut merged: BTreeMap<String, Vec<u8>> = committed
            .into_iter()
            .map(|(key, value)| (key, value.value))
            .collect();
        for (key, op) in self
            .writes
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(&prefix))
        {
            match op {
                WriteOp::Put(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                WriteOp::Delete => {
                    merged.remove(key);
                }
            }
        }

        debug!(tx_id = %self.tx_id, object_type, entries = merged.len(), "prefix scan");
        self.open_cursors.set(self.open_cursors.get() + 1);
        Ok(ScanCursor {
            entries: merged.into_iter(),
            open_cursors: &self.open_cursors,
        })
    }

    /// Stage an event record to be committed with this transaction.
    pub fn stage_event(&mut self, event: EventRecord) {
        self.events.push(event);
    }

    pub fn staged_events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Number of scan cursors not yet released.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.get()
    }

    /// Close the transaction into a batch the store can validate and apply.
    pub fn into_batch(self) -> StoreResult<CommitBatch> {
        let open = self.open_cursors.get();
        if open > 0 {
            return Err(StoreError::CursorsOpen(open));
        }

        Ok(CommitBatch {
            tx_id: self.tx_id,
            reads: self
                .reads
                .into_inner()
                .into_iter()
                .map(|(key, version)| ReadVersion { key, version })
                .collect(),
            range_reads: self.range_reads.into_inner(),
            writes: self
                .writes
                .into_iter()
                .map(|(key, op)| Write { key, op })
                .collect(),
            events: self.events,
        })
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("tx_id", &self.tx_id)
            .field("writes", &self.writes.len())
            .field("events", &self.events.len())
            .field("open_cursors", &self.open_cursors.get())
            .finish()
    }
}

/// Single-pass cursor over a prefix scan. Released on drop.
pub struct ScanCursor<'a> {
    entries: std::collections::btree_map::IntoIter<String, Vec<u8>>,
    open_cursors: &'a Cell<usize>,
}

impl ScanCursor<'_> {
    /// Release the cursor explicitly.
    pub fn close(self) {}
}

impl Iterator for ScanCursor<'_> {
    type Item = (String, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl Drop for ScanCursor<'_> {
    fn drop(&mut self) {
        self.open_cursors.set(self.open_cursors.get().saturating_sub(1));
    }
}
