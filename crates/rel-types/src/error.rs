use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown {entity_type} status: {value}")]
    UnknownStatus { entity_type: String, value: String },

    #[error("unknown change type: {0}")]
    UnknownChangeType(String),
}
