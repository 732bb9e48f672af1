//! Error types for lock operations.

use nwloader_store::StoreError;

/// Error type for lock-guarded task execution.
///
/// `E` is the error type of the guarded task. A task failure is re-raised
/// only after the safe release ran, so the lock is never leaked on the
/// error path (it would otherwise linger until its store-side expiry).
#[derive(Debug, thiserror::Error)]
pub enum LockError<E> {
    /// A store operation failed during acquisition, polling, or release.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The guarded task itself failed.
    #[error("lock task failed: {0}")]
    Task(E),
}

impl<E> LockError<E> {
    /// Extracts the task error, if that is what this is.
    pub fn into_task_error(self) -> Result<E, StoreError> {
        match self {
            LockError::Task(err) => Ok(err),
            LockError::Store(err) => Err(err),
        }
    }
}
