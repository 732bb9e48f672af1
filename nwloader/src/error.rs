//! Error types for cache operations.

use std::time::Duration;

use nwloader_lock::LockError;
use nwloader_store::StoreError;

use crate::source::BoxError;

/// Error type for cache operations.
///
/// Construction-time validation failures are raised synchronously by the
/// builders. At load time, errors reach the caller only while the caller is
/// still unresolved; once a value has been served, later failures in the
/// same cycle are background failures and are logged instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The loader name is empty or contains characters outside
    /// `A-Z a-z 0-9 : _ - . [ ]`.
    #[error("invalid loader name {0:?}")]
    InvalidName(String),

    /// The configured TTL is below the 2-second minimum.
    ///
    /// Entries live for twice the TTL; below two seconds the whole-second
    /// resolution of the store's `TTL` probe cannot distinguish fresh from
    /// stale.
    #[error("ttl must be at least 2 seconds, got {0:?}")]
    TtlTooSmall(Duration),

    /// No key-value store was configured. Call `.store()` before building.
    #[error("no key-value store configured. Call .store() before building")]
    MissingStore,

    /// A store operation failed while the caller was still unresolved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Arguments or a cache entry could not be encoded as JSON.
    #[error("cache encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The user loader failed, annotated with the loader name and the
    /// derived cache key it was invoked for.
    #[error("loader {name} failed for key {key}: {source}")]
    Source {
        /// Name of the loader.
        name: String,
        /// Derived cache key the fetch was keyed by.
        key: String,
        /// The loader's own error.
        #[source]
        source: BoxError,
    },
}

impl From<LockError<CacheError>> for CacheError {
    fn from(err: LockError<CacheError>) -> Self {
        match err {
            LockError::Task(err) => err,
            LockError::Store(err) => CacheError::Store(err),
        }
    }
}
