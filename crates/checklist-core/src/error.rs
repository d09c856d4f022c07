use crate::task::TaskId;

/// Raised when a filter name is not one of `all`, `active`, `completed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter: {value:?} (expected all, active or completed)")]
pub struct InvalidFilterError {
    pub value: String,
}

/// Raised by the write path when a mutation cannot be durably queued.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("task already exists: {0}")]
    DuplicateId(TaskId),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("no task is being edited")]
    NotEditing,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode task records")]
    Encode(#[from] serde_json::Error),
    #[error("storage io failed")]
    Io(#[from] std::io::Error),
}
