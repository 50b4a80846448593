use crate::error::StoreResult;
use crate::record::{CommitBatch, CommitRecord, VersionedValue};

/// Ordered, versioned key/value state store.
///
/// All implementations must satisfy these invariants:
/// - `scan_prefix` returns entries in lexicographic key order.
/// - `commit` is atomic: it validates every read and range read in the batch
///   against the current versions and then applies all writes, or applies
///   nothing and returns an error.
/// - Committed records are never rewritten; the commit log only grows.
pub trait StateStore: Send + Sync {
    /// Read the committed value of a key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Read every committed entry whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>>;

    /// Validate and apply a batch. Returns the sequence of the new commit, or
    /// the current height for a read-only batch.
    fn commit(&self, batch: &CommitBatch) -> StoreResult<u64>;

    /// Sequence of the latest commit (0 for an empty store).
    fn height(&self) -> StoreResult<u64>;

    /// Committed records with `seq >= from_seq`, in commit order.
    fn commits(&self, from_seq: u64) -> StoreResult<Vec<CommitRecord>>;

    /// Check whether a key exists.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
