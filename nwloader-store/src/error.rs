//! Error types for store operations.

use redis::RedisError;

/// Error type for store operations.
///
/// Wraps transport errors from the underlying [`redis`] client. Layers above
/// decide whether a store failure is fatal or degrades to a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An error from the underlying Redis client: connection failures,
    /// protocol errors, authentication failures, and command errors.
    #[error("store error: {0}")]
    Redis(#[from] RedisError),

    /// No connection URL was specified when building the store.
    ///
    /// Call [`RedisStoreBuilder::url`] before [`RedisStoreBuilder::build`].
    ///
    /// [`RedisStoreBuilder::url`]: crate::RedisStoreBuilder::url
    /// [`RedisStoreBuilder::build`]: crate::RedisStoreBuilder::build
    #[error("connection URL not specified. Call .url() before .build()")]
    MissingUrl,
}
