//! Event bus error types

use thiserror::Error;

/// Errors raised synchronously from bus operations.
///
/// Handler delivery failures are never surfaced here; they are retried and
/// terminate in the dead-letter queue.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    #[error("publisher '{publisher}' is not registered for event type '{event_type}'")]
    UnregisteredPublisher { publisher: String, event_type: String },

    #[error("event source cannot be empty")]
    EmptySource,

    #[error("event bus is shut down")]
    ShutDown,

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for bus operations
pub type BusResult<T> = Result<T, BusError>;
