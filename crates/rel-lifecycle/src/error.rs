/// Errors raised by transition validation and graph registration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// No graph is registered for the entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The current status is not a node of the entity type's graph.
    #[error("unknown {entity_type} status: {status}")]
    UnknownStatus { entity_type: String, status: String },

    /// The graph has no edge from `from` to `to`.
    #[error("illegal {entity_type} transition: {from} -> {to}")]
    IllegalTransition {
        entity_type: String,
        from: String,
        to: String,
    },

    /// A graph for this entity type is already registered.
    #[error("transition graph already registered for {0}")]
    DuplicateGraph(String),

    /// The graph definition itself is malformed.
    #[error("invalid transition graph for {entity_type}: {reason}")]
    InvalidGraph { entity_type: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TransitionError>;
