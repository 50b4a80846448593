use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::record::{CommitBatch, CommitRecord, VersionedValue, WriteOp};
use crate::traits::StateStore;

/// In-memory, `BTreeMap`-based state store.
///
/// Intended for tests and embedding, and as the state layer underneath
/// [`WalStateStore`](crate::WalStateStore). State and the commit log live
/// behind one `RwLock`, so validation and application of a batch happen
/// under a single write guard.
pub struct InMemoryStateStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    entries: BTreeMap<String, VersionedValue>,
    log: Vec<CommitRecord>,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_state()?.entries.len())
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_state()?.entries.is_empty())
    }

    /// Validate a batch, hand the resulting record to `persist`, then apply it.
    ///
    /// `persist` runs under the write guard; if it fails, nothing is applied.
    pub(crate) fn commit_with<F>(&self, batch: &CommitBatch, persist: F) -> StoreResult<u64>
    where
        F: FnOnce(&CommitRecord) -> StoreResult<()>,
    {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        Self::validate(&state, batch)?;

        let height = state.log.len() as u64;
        if batch.is_read_only() {
            return Ok(height);
        }

        let record = CommitRecord {
            seq: height + 1,
            tx_id: batch.tx_id.clone(),
            committed_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            writes: batch.writes.clone(),
            events: batch.events.clone(),
        };

        persist(&record)?;
        let seq = record.seq;
        Self::apply(&mut state, record);

        debug!(
            seq,
            tx_id = %batch.tx_id,
            writes = batch.writes.len(),
            events = batch.events.len(),
            "commit applied"
        );
        Ok(seq)
    }

    /// Apply a previously committed record without read validation.
    ///
    /// Used when rebuilding state from a write-ahead log.
    pub(crate) fn replay(&self, record: CommitRecord) -> StoreResult<()> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let expected = state.log.len() as u64 + 1;
        if record.seq != expected {
            return Err(StoreError::SequenceGap {
                expected,
                found: record.seq,
            });
        }
        Self::apply(&mut state, record);
        Ok(())
    }

    fn validate(state: &StoreState, batch: &CommitBatch) -> StoreResult<()> {
        for read in &batch.reads {
            let current = state.entries.get(&read.key).map(|v| v.version);
            if current != read.version {
                return Err(StoreError::Conflict {
                    key: read.key.clone(),
                    read: read.version,
                    current,
                });
            }
        }

        for range in &batch.range_reads {
            let mut current = Self::prefix_range(state, &range.prefix).map(|(k, v)| (k, v.version));
            for (key, version) in &range.observed {
                match current.next() {
                    Some((k, v)) if k == key && v == *version => {}
                    Some((k, v)) => {
                        return Err(StoreError::Conflict {
                            key: k.clone(),
                            read: Some(*version),
                            current: Some(v),
                        })
                    }
                    None => {
                        return Err(StoreError::Conflict {
                            key: key.clone(),
                            read: Some(*version),
                            current: None,
                        })
                    }
                }
            }
            // A key inserted into the range after the scan is a phantom.
            if let Some((k, v)) = current.next() {
                return Err(StoreError::Conflict {
                    key: k.clone(),
                    read: None,
                    current: Some(v),
                });
            }
        }

        Ok(())
    }

    fn apply(state: &mut StoreState, record: CommitRecord) {
        for write in &record.writes {
            match &write.op {
                WriteOp::Put(value) => {
                    state.entries.insert(
                        write.key.clone(),
                        VersionedValue {
                            value: value.clone(),
                            version: record.seq,
                        },
                    );
                }
                WriteOp::Delete => {
                    state.entries.remove(&write.key);
                }
            }
        }
        state.log.push(record);
    }

    fn prefix_range<'a>(
        state: &'a StoreState,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a VersionedValue)> + 'a {
        state
            .entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    fn read_state(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        Ok(self.read_state()?.entries.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        let state = self.read_state()?;
        Ok(Self::prefix_range(&state, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: &CommitBatch) -> StoreResult<u64> {
        self.commit_with(batch, |_| Ok(()))
    }

    fn height(&self) -> StoreResult<u64> {
        Ok(self.read_state()?.log.len() as u64)
    }

    fn commits(&self, from_seq: u64) -> StoreResult<Vec<CommitRecord>> {
        let state = self.read_state()?;
        let start = from_seq.saturating_sub(1) as usize;
        Ok(state.log.iter().skip(start).cloned().collect())
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keys, height) = match self.inner.read() {
            Ok(state) => (state.entries.len(), state.log.len()),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryStateStore")
            .field("key_count", &keys)
            .field("height", &height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventRecord, RangeRead, ReadVersion, Write};

    fn put(key: &str, value: &[u8]) -> Write {
        Write {
            key: key.into(),
            op: WriteOp::Put(value.to_vec()),
        }
    }

    fn batch(writes: Vec<Write>) -> CommitBatch {
        CommitBatch {
            tx_id: "tx".into(),
            writes,
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn commit_and_get() {
        let store = InMemoryStateStore::new();
        let seq = store.commit(&batch(vec![put("a", b"1")])).unwrap();
        assert_eq!(seq, 1);

        let value = store.get("a").unwrap().expect("should exist");
        assert_eq!(value.value, b"1");
        assert_eq!(value.version, 1);
        assert!(store.exists("a").unwrap());
        assert!(!store.exists("b").unwrap());
    }

    #[test]
    fn delete_removes_key() {
        let store = InMemoryStateStore::new();
        store.commit(&batch(vec![put("a", b"1")])).unwrap();
        store
            .commit(&batch(vec![Write {
                key: "a".into(),
                op: WriteOp::Delete,
            }]))
            .unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.height().unwrap(), 2);
    }

    #[test]
    fn read_only_batch_does_not_advance_height() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.commit(&CommitBatch::default()).unwrap(), 0);
        assert_eq!(store.height().unwrap(), 0);
        assert!(store.commits(1).unwrap().is_empty());
    }

    #[test]
    fn event_only_batch_is_logged() {
        let store = InMemoryStateStore::new();
        let seq = store
            .commit(&CommitBatch {
                tx_id: "tx-e".into(),
                events: vec![EventRecord {
                    name: "Ping".into(),
                    payload: b"{}".to_vec(),
                }],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(seq, 1);
        assert_eq!(store.commits(1).unwrap()[0].events.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn scan_prefix_is_lexicographic() {
        let store = InMemoryStateStore::new();
        store
            .commit(&batch(vec![
                put("p/c", b"3"),
                put("p/a", b"1"),
                put("q/a", b"x"),
                put("p/b", b"2"),
            ]))
            .unwrap();

        let keys: Vec<String> = store
            .scan_prefix("p/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["p/a", "p/b", "p/c"]);
    }

    // -----------------------------------------------------------------------
    // MVCC validation
    // -----------------------------------------------------------------------

    #[test]
    fn stale_read_is_a_conflict() {
        let store = InMemoryStateStore::new();
        store.commit(&batch(vec![put("a", b"1")])).unwrap();
        store.commit(&batch(vec![put("a", b"2")])).unwrap();

        let stale = CommitBatch {
            tx_id: "late".into(),
            reads: vec![ReadVersion {
                key: "a".into(),
                version: Some(1),
            }],
            writes: vec![put("a", b"3")],
            ..Default::default()
        };
        let err = store.commit(&stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { current: Some(2), .. }));
        assert_eq!(store.get("a").unwrap().unwrap().value, b"2");
    }

    #[test]
    fn absent_read_conflicts_with_concurrent_insert() {
        let store = InMemoryStateStore::new();
        store.commit(&batch(vec![put("a", b"1")])).unwrap();

        let racer = CommitBatch {
            tx_id: "racer".into(),
            reads: vec![ReadVersion {
                key: "a".into(),
                version: None,
            }],
            writes: vec![put("a", b"mine")],
            ..Default::default()
        };
        assert!(matches!(
            store.commit(&racer),
            Err(StoreError::Conflict { read: None, .. })
        ));
    }

    #[test]
    fn phantom_in_range_is_a_conflict() {
        let store = InMemoryStateStore::new();
        store.commit(&batch(vec![put("p/a", b"1")])).unwrap();
        let observed = vec![("p/a".to_string(), 1)];

        store.commit(&batch(vec![put("p/b", b"2")])).unwrap();

        let scan_then_write = CommitBatch {
            tx_id: "scanner".into(),
            range_reads: vec![RangeRead {
                prefix: "p/".into(),
                observed,
            }],
            writes: vec![put("summary", b"1 entry")],
            ..Default::default()
        };
        let err = store.commit(&scan_then_write).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref key, .. } if key == "p/b"));
    }

    #[test]
    fn unchanged_range_commits() {
        let store = InMemoryStateStore::new();
        store.commit(&batch(vec![put("p/a", b"1")])).unwrap();
        store.commit(&batch(vec![put("other", b"x")])).unwrap();

        let ok = CommitBatch {
            tx_id: "scanner".into(),
            range_reads: vec![RangeRead {
                prefix: "p/".into(),
                observed: vec![("p/a".to_string(), 1)],
            }],
            writes: vec![put("summary", b"1 entry")],
            ..Default::default()
        };
        assert_eq!(store.commit(&ok).unwrap(), 3);
    }

    // -----------------------------------------------------------------------
    // Commit log
    // -----------------------------------------------------------------------

    #[test]
    fn commits_from_sequence() {
        let store = InMemoryStateStore::new();
        for i in 0..3u8 {
            store.commit(&batch(vec![put("k", &[i])])).unwrap();
        }
        let tail = store.commits(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 2);
        assert_eq!(store.commits(0).unwrap().len(), 3);
    }

    #[test]
    fn replay_rejects_sequence_gap() {
        let store = InMemoryStateStore::new();
        let record = CommitRecord {
            seq: 2,
            tx_id: "t".into(),
            committed_at_ms: 0,
            writes: vec![],
            events: vec![],
        };
        assert!(matches!(
            store.replay(record),
            Err(StoreError::SequenceGap { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn failed_persist_applies_nothing() {
        let store = InMemoryStateStore::new();
        let err = store
            .commit_with(&batch(vec![put("a", b"1")]), |_| {
                Err(StoreError::Io(std::io::Error::other("disk full")))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.height().unwrap(), 0);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStateStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStateStore"));
        assert!(debug.contains("key_count"));
    }
}
