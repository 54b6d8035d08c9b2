// Error types for the task store

use thiserror::Error;

/// Alias for `Result<T, StoreError>`
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage faults and rejected input
///
/// A missing `(user_id, task_id)` pair is not an error: owner-scoped
/// operations report it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task was cancelled or panicked
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// Input the store refuses to persist
    #[error("invalid input: {0}")]
    Validation(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
