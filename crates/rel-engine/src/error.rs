use rel_ledger::LedgerError;
use rel_lifecycle::TransitionError;
use rel_store::StoreError;
use rel_types::EntityType;
use serde_json::{json, Value};

/// Errors surfaced to callers of the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed or missing arguments; rejected before any ledger access.
    #[error("{0}")]
    Input(String),

    /// A business rule was violated; nothing was written.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: EntityType, id: String },

    /// The requested status change is not an edge of the entity's graph.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The store failed or rejected the commit (including conflicts).
    #[error("{0}")]
    Persistence(String),

    /// The event channel refused the unit of work's events.
    #[error("{0}")]
    Emission(String),

    /// The engine configuration is invalid or unreadable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Stable error category name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::Validation(_) => "ValidationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Transition(_) => "TransitionError",
            Self::Persistence(_) => "PersistenceError",
            Self::Emission(_) => "EventEmissionError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Structured failure: `{"error": {"kind": ..., "message": ...}}`.
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::MissingActor => Self::Input(err.to_string()),
            LedgerError::Emission(_) => Self::Emission(err.to_string()),
            LedgerError::Store(_)
            | LedgerError::MalformedHistory { .. }
            | LedgerError::Serialization(_) => Self::Persistence(err.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
