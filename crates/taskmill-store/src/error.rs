use thiserror::Error;

/// Errors that can occur during task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No task with the given ID exists in the store.
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// The provided task ID is not a valid UUID.
    #[error("invalid task id: {0}")]
    InvalidId(String),

    /// A lifecycle update was attempted out of order, e.g. recording a start
    /// before a claim or completing an already-terminal task. The row is left
    /// in its last valid state.
    #[error("invalid transition for task {id}: {detail}")]
    InvalidTransition { id: String, detail: &'static str },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
