//! Ordered, versioned state storage for the Regulated Entity Ledger.
//!
//! This crate is the ledger's key/value surface. Handlers never touch a
//! store directly: every invocation works through a [`Transaction`], which
//! buffers writes, records what it read, and hands the ledger a
//! [`CommitBatch`] that the store validates and applies atomically.
//!
//! # Storage Backends
//!
//! All backends implement the [`StateStore`] trait:
//!
//! - [`InMemoryStateStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`WalStateStore`] -- in-memory state rebuilt from a CRC-framed write-ahead log
//!
//! # Design Rules
//!
//! 1. Keys iterate in lexicographic byte order; nothing assumes insertion order.
//! 2. Every stored value carries the sequence number of the commit that wrote it.
//! 3. A commit is rejected if any key or range it read has moved since (MVCC).
//! 4. Scan cursors borrow their transaction and release themselves on drop.
//! 5. The store never interprets values or event payloads.

pub mod durable;
pub mod error;
pub mod keys;
pub mod memory;
pub mod record;
pub mod traits;
pub mod txn;
pub mod wal;

// Re-export primary types at crate root for ergonomic imports.
pub use durable::{WalStateStore, WAL_FILE_NAME};
pub use error::{StoreError, StoreResult};
pub use keys::{composite_key, split_composite_key, COMPOSITE_KEY_DELIMITER};
pub use memory::InMemoryStateStore;
pub use record::{
    CommitBatch, CommitRecord, EventRecord, RangeRead, ReadVersion, VersionedValue, Write,
    WriteOp,
};
pub use traits::StateStore;
pub use txn::{ScanCursor, Transaction};
pub use wal::{SyncMode, WalConfig, WriteAheadLog};
