//! Error types for room timelines.

use crate::types::RoomId;
use thiserror::Error;

/// Main error type for timeline and room operations.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("No pending event for transaction {0}")]
    PendingNotFound(String),

    #[error("An event of type {0} is already pending")]
    PendingConflict(String),

    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("Page source error: {0}")]
    Source(String),

    #[error("Subscription dropped")]
    SubscriptionDropped,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for TimelineError {
    fn from(e: serde_json::Error) -> Self {
        TimelineError::Malformed(e.to_string())
    }
}

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;
