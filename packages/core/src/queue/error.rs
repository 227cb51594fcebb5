use serde::Serialize;
use thiserror::Error;

/// One field-level validation failure, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn required(field: &'static str) -> Self {
        Self {
            field,
            message: "is required".to_string(),
        }
    }
}

/// Errors surfaced by queue operations.
///
/// Notification delivery failures are deliberately absent: delivery is
/// best-effort and never propagated past the dispatch layer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid enqueue input")]
    Validation(Vec<FieldError>),

    #[error("no queue item with that id")]
    NotFound,

    #[error("queue item is already opened")]
    AlreadyOpened,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
