use rel_fabric::FabricError;
use rel_store::StoreError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The store rejected a read, a write, or the commit itself.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The event fabric refused the unit of work's events.
    #[error("event emission failed: {0}")]
    Emission(#[from] FabricError),

    /// Every unit of work must name the identity performing it.
    #[error("missing actor identity")]
    MissingActor,

    /// A stored history entry could not be decoded.
    #[error("malformed history entry at {key:?}: {reason}")]
    MalformedHistory { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
