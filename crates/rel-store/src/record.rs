use serde::{Deserialize, Serialize};

/// A stored value together with the sequence of the commit that wrote it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// A buffered mutation of one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    Put(Vec<u8>),
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    pub key: String,
    pub op: WriteOp,
}

/// An event emitted inside a unit of work, carried opaquely by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub payload: Vec<u8>,
}

/// The version of a key observed by a transaction (`None` = key absent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadVersion {
    pub key: String,
    pub version: Option<u64>,
}

/// The exact set of keys (and versions) a prefix scan observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeRead {
    pub prefix: String,
    pub observed: Vec<(String, u64)>,
}

/// Everything a store needs to validate and apply one unit of work.
#[derive(Clone, Debug, Default)]
pub struct CommitBatch {
    pub tx_id: String,
    pub reads: Vec<ReadVersion>,
    pub range_reads: Vec<RangeRead>,
    pub writes: Vec<Write>,
    pub events: Vec<EventRecord>,
}

impl CommitBatch {
    /// Returns `true` if applying this batch would change nothing.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty() && self.events.is_empty()
    }
}

/// A committed unit of work as persisted in the commit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// 1-based position in the commit log; also the version of every key it wrote.
    pub seq: u64,
    pub tx_id: String,
    /// Wall-clock milliseconds at which the store accepted the commit.
    pub committed_at_ms: u64,
    pub writes: Vec<Write>,
    pub events: Vec<EventRecord>,
}
