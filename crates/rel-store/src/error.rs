/// Errors from state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A key or composite-key attribute is malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Attempted to store an empty value (use delete instead).
    #[error("empty value for key {0:?}")]
    EmptyValue(String),

    /// A key or range read by the transaction changed before it committed.
    #[error("commit conflict on {key:?}: read version {read:?}, current version {current:?}")]
    Conflict {
        key: String,
        read: Option<u64>,
        current: Option<u64>,
    },

    /// A transaction was committed while scan cursors were still open.
    #[error("{0} scan cursor(s) still open at commit")]
    CursorsOpen(usize),

    /// A replayed commit record does not extend the current height.
    #[error("commit sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
