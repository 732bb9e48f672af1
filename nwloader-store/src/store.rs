//! The key-value store capability contract.
//!
//! [`KeyStore`] covers the five operations the cache and lock layers need
//! from a Redis-compatible backend. All operations are atomic at the store
//! level and may fail with a transport error. The adapter moves opaque
//! string blobs; serialization happens in the layers above.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Write mode for [`KeyStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Unconditional write, overwriting any existing value.
    Upsert,
    /// Create-only write (`SET ... NX`). The write is rejected if a live
    /// value already exists under the key.
    IfAbsent,
}

/// Outcome of a [`KeyStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    /// The value was written.
    Written,
    /// A create-only write found an existing live value and wrote nothing.
    Conflict,
}

impl SetStatus {
    /// Returns `true` if the value was written.
    pub fn is_written(&self) -> bool {
        matches!(self, SetStatus::Written)
    }
}

/// Remaining lifetime of a key, mirroring the reply domain of Redis `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key exists and expires after this duration.
    Remaining(Duration),
    /// The key exists but carries no expiry (`TTL` reply `-1`).
    NoExpiry,
    /// The key does not exist (`TTL` reply `-2`).
    Missing,
}

/// Capability contract over a Redis-compatible key-value store.
///
/// Implementations must provide atomicity per operation: `set` with
/// [`SetMode::IfAbsent`] is the linearization point the lock layer builds
/// on, and `eval` must execute the whole script atomically.
#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    /// Returns the stored blob under `key`, never a partial value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key` with the given expiry.
    ///
    /// With [`SetMode::IfAbsent`] the write succeeds only when no live value
    /// exists; the conflicting case is reported as [`SetStatus::Conflict`],
    /// not as an error.
    async fn set(
        &self,
        key: &str,
        value: &str,
        expire: Duration,
        mode: SetMode,
    ) -> StoreResult<SetStatus>;

    /// Unconditionally deletes `key`, returning the number of removed
    /// entries (0 or 1).
    async fn del(&self, key: &str) -> StoreResult<u64>;

    /// Probes the remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> StoreResult<Ttl>;

    /// Atomically evaluates a server-side script with the given keys and
    /// arguments, returning its integer reply.
    ///
    /// The only script this workspace ships is [`DEL_IF_MATCH_SCRIPT`];
    /// backends may reject unknown sources.
    ///
    /// [`DEL_IF_MATCH_SCRIPT`]: crate::DEL_IF_MATCH_SCRIPT
    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> StoreResult<i64>;
}

#[async_trait]
impl<S: KeyStore> KeyStore for Arc<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        expire: Duration,
        mode: SetMode,
    ) -> StoreResult<SetStatus> {
        (**self).set(key, value, expire, mode).await
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        (**self).del(key).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        (**self).ttl(key).await
    }

    async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> StoreResult<i64> {
        (**self).eval(script, keys, args).await
    }
}
