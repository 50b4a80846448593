/// Errors produced by the event fabric.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// The fabric has been shut down and cannot accept events.
    #[error("event fabric is shut down")]
    Shutdown,

    /// An event payload exceeds the configured size limit.
    #[error("event {name} payload is {size} bytes, limit is {max}")]
    PayloadTooLarge { name: String, size: usize, max: usize },

    /// The event name is not part of the event channel vocabulary.
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
