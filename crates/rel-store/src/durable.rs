use std::path::Path;

use tracing::info;

use crate::error::StoreResult;
use crate::memory::InMemoryStateStore;
use crate::record::{CommitBatch, CommitRecord, VersionedValue};
use crate::traits::StateStore;
use crate::wal::{WalConfig, WriteAheadLog};

/// File name of the commit log inside a data directory.
pub const WAL_FILE_NAME: &str = "commits.wal";

/// Durable state store: in-memory state rebuilt from a write-ahead log.
///
/// Every commit is appended to the WAL before it is applied, under the same
/// lock that validates it, so the in-memory view never runs ahead of disk.
pub struct WalStateStore {
    state: InMemoryStateStore,
    wal: WriteAheadLog,
}

impl WalStateStore {
    /// Open the store in `dir`, replaying every recovered commit.
    pub fn open(dir: &Path, config: WalConfig) -> StoreResult<Self> {
        let wal = WriteAheadLog::open(&dir.join(WAL_FILE_NAME), config)?;
        let state = InMemoryStateStore::new();

        let records = wal.recover()?;
        let replayed = records.len();
        for record in records {
            state.replay(record)?;
        }

        info!(
            path = %wal.path().display(),
            replayed,
            "state store opened"
        );
        Ok(Self { state, wal })
    }

    /// The underlying write-ahead log.
    pub fn wal(&self) -> &WriteAheadLog {
        &self.wal
    }
}

impl StateStore for WalStateStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        self.state.get(key)
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        self.state.scan_prefix(prefix)
    }

    fn commit(&self, batch: &CommitBatch) -> StoreResult<u64> {
        self.state
            .commit_with(batch, |record| self.wal.append(record).map(|_| ()))
    }

    fn height(&self) -> StoreResult<u64> {
        self.state.height()
    }

    fn commits(&self, from_seq: u64) -> StoreResult<Vec<CommitRecord>> {
        self.state.commits(from_seq)
    }
}
