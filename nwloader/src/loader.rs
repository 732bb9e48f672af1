//! The cache-refresh orchestrator.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, error, warn};

use nwloader_lock::{RaceLock, RaceOutcome};
use nwloader_store::{KeyStore, SetMode};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::freshness::{Freshness, freshness_of};
use crate::key::{derive_key, validate_name};
use crate::offload::Offload;
use crate::source::Source;

/// Default freshness threshold.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Smallest accepted freshness threshold.
pub const MIN_TTL: Duration = Duration::from_secs(2);

/// Default namespace for data keys.
pub const DEFAULT_KEY_PREFIX: &str = "nwloader";

/// Read-through cache around one [`Source`].
///
/// On every `load` the orchestrator decides between serving cached data,
/// triggering a refresh, or waiting for a refresh that runs elsewhere:
///
/// - A **fresh** hit (more than `ttl` remaining on the entry) is served
///   as-is.
/// - A **stale** hit is served immediately while a refresh runs on a
///   background task, guarded by a distributed single-flight lock so only
///   one process refreshes. Failures of such a refresh are logged and never
///   reach the caller, who already has data.
/// - A **miss** fetches under the lock; callers who lose that race wait for
///   the winner's release and then read the primed cache.
///
/// Data keys are `{key_prefix}:{name}:{derived_key}` and entries expire
/// after `2 * ttl`, giving every entry a freshness window followed by an
/// equally long stale-while-revalidate window.
///
/// Cloning is cheap and clones share the store, the lock namespace, and
/// the background task registry.
pub struct Loader<S, F> {
    name: String,
    ttl: Duration,
    key_prefix: String,
    store: Arc<S>,
    lock: RaceLock<S>,
    source: Arc<F>,
    offload: Offload,
}

impl<S, F> Clone for Loader<S, F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            ttl: self.ttl,
            key_prefix: self.key_prefix.clone(),
            store: Arc::clone(&self.store),
            lock: self.lock.clone(),
            source: Arc::clone(&self.source),
            offload: self.offload.clone(),
        }
    }
}

impl<S: KeyStore, F: Source> Loader<S, F> {
    /// Creates a builder for a loader with the given name and source.
    ///
    /// The name namespaces this loader's keys in the shared store and must
    /// match `[A-Za-z0-9:_\-\.\[\]]+`.
    pub fn builder(name: impl Into<String>, source: F) -> LoaderBuilder<S, F> {
        LoaderBuilder {
            name: name.into(),
            source,
            store: None,
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            lock_prefix: nwloader_lock::DEFAULT_KEY_PREFIX.to_owned(),
            check_lock_delay: nwloader_lock::DEFAULT_CHECK_LOCK_DELAY,
            lock_timeout: nwloader_lock::DEFAULT_TIMEOUT,
        }
    }

    /// This loader's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The background task registry, for joining in-flight refreshes.
    pub fn offload(&self) -> &Offload {
        &self.offload
    }

    /// Loads the value for `args`, from cache when possible.
    pub async fn load(&self, args: F::Args) -> Result<F::Value, CacheError> {
        let base_key = derive_key(&args)?;
        self.load_keyed(args, base_key).await
    }

    fn load_keyed<'a>(
        &'a self,
        args: F::Args,
        base_key: String,
    ) -> BoxFuture<'a, Result<F::Value, CacheError>> {
        Box::pin(async move {
            let data_key = self.data_key(&base_key);

            // Read phase: any stored value resolves the caller, stale or not.
            if let Some(value) = self.read_entry(&data_key).await {
                match self.probe_freshness(&data_key).await {
                    Freshness::Fresh => {
                        debug!(key = %data_key, "cache hit, fresh");
                        return Ok(value);
                    }
                    Freshness::Stale => {
                        debug!(key = %data_key, "cache hit, stale");
                        self.spawn_refresh(args, base_key);
                        return Ok(value);
                    }
                }
            }

            debug!(key = %data_key, "cache miss");
            let outcome = self
                .lock
                .race(&base_key, None, |_delayed| self.refresh(&args, &base_key), false)
                .await?;

            match outcome {
                RaceOutcome::Executed(value) => Ok(value),
                RaceOutcome::Skipped => {
                    // Lost the race: the winner primed the cache, so this read
                    // is expected to hit. Reached only on a miss, so one
                    // refresh cycle produces at most one re-read.
                    self.load_keyed(args, base_key).await
                }
            }
        })
    }

    /// Stores `value` under `key`, overwriting any existing entry.
    ///
    /// The entry expires after twice the freshness threshold. Returns
    /// `true` when the store acknowledged the write.
    pub async fn prime<K>(&self, key: &K, value: &F::Value) -> Result<bool, CacheError>
    where
        K: Serialize + ?Sized,
    {
        let base_key = derive_key(key)?;
        self.write_entry(&base_key, value).await
    }

    /// Removes the entry under `key`, returning 1 if something was removed.
    pub async fn clear<K>(&self, key: &K) -> Result<u64, CacheError>
    where
        K: Serialize + ?Sized,
    {
        let base_key = derive_key(key)?;
        let data_key = self.data_key(&base_key);
        Ok(self.store.del(&data_key).await?)
    }

    /// Reads and decodes the entry under `data_key`.
    ///
    /// Store failures and undecodable blobs both degrade to a miss; the
    /// refresh path will overwrite whatever is there.
    async fn read_entry(&self, data_key: &str) -> Option<F::Value> {
        let raw = match self.store.get(data_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %data_key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry<F::Value>>(&raw) {
            Ok(entry) => Some(entry.value),
            Err(err) => {
                warn!(key = %data_key, error = %err, "undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Probes the entry's remaining TTL. A failed probe counts as stale:
    /// serving the value just read is safe, and the refresh will repair
    /// the entry.
    async fn probe_freshness(&self, data_key: &str) -> Freshness {
        match self.store.ttl(data_key).await {
            Ok(ttl) => freshness_of(ttl, self.ttl),
            Err(err) => {
                warn!(key = %data_key, error = %err, "ttl probe failed, treating as stale");
                Freshness::Stale
            }
        }
    }

    /// Fetches from the source and primes the cache.
    async fn refresh(&self, args: &F::Args, base_key: &str) -> Result<F::Value, CacheError> {
        let value = self
            .source
            .fetch(args)
            .await
            .map_err(|source| CacheError::Source {
                name: self.name.clone(),
                key: base_key.to_owned(),
                source,
            })?;
        self.write_entry(base_key, &value).await?;
        Ok(value)
    }

    /// Runs a race-guarded refresh on a background task.
    ///
    /// The caller has already been resolved with the stale value, so the
    /// lock is taken with `ignore`: losing it means another process is
    /// refreshing and there is nothing left to do here. Errors are logged
    /// and swallowed.
    fn spawn_refresh(&self, args: F::Args, base_key: String) {
        let loader = self.clone();
        self.offload.spawn("refresh", async move {
            let outcome = loader
                .lock
                .race(
                    &base_key,
                    None,
                    |_delayed| loader.refresh(&args, &base_key),
                    true,
                )
                .await;
            match outcome {
                Ok(RaceOutcome::Executed(_)) => {
                    debug!(key = %base_key, "background refresh completed");
                }
                Ok(RaceOutcome::Skipped) => {
                    debug!(key = %base_key, "background refresh already running elsewhere");
                }
                Err(err) => {
                    let err = CacheError::from(err);
                    error!(key = %base_key, error = %err, "background refresh failed");
                }
            }
        });
    }

    async fn write_entry(&self, base_key: &str, value: &F::Value) -> Result<bool, CacheError> {
        let data_key = self.data_key(base_key);
        let blob =
            serde_json::to_string(&CacheEntry::now(value)).map_err(CacheError::Encode)?;
        let status = self
            .store
            .set(&data_key, &blob, self.ttl * 2, SetMode::Upsert)
            .await?;
        Ok(status.is_written())
    }

    fn data_key(&self, base_key: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, self.name, base_key)
    }
}

/// Builder for [`Loader`].
pub struct LoaderBuilder<S, F> {
    name: String,
    source: F,
    store: Option<Arc<S>>,
    ttl: Duration,
    key_prefix: String,
    lock_prefix: String,
    check_lock_delay: Duration,
    lock_timeout: Duration,
}

impl<S: KeyStore, F: Source> LoaderBuilder<S, F> {
    /// Sets the key-value store backing this loader.
    ///
    /// Required before [`build`](Self::build).
    pub fn store(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets the store from an already shared handle.
    pub fn shared_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the freshness threshold. Default: 30 s, minimum 2 s.
    ///
    /// Entries older than this are served stale while a background refresh
    /// runs; entries are dropped by the store entirely after twice this
    /// duration.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the namespace for data keys. Default: `"nwloader"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the namespace for the refresh locks. Default: `"nwlock"`.
    pub fn lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    /// Sets the poll interval for contended locks. Default: 100 ms.
    pub fn check_lock_delay(mut self, delay: Duration) -> Self {
        self.check_lock_delay = delay;
        self
    }

    /// Sets the store-side expiry of refresh locks. Default: 10 s.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Builds the [`Loader`].
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidName`] for an empty name or one outside the
    ///   permitted character class.
    /// - [`CacheError::TtlTooSmall`] for a TTL under 2 seconds.
    /// - [`CacheError::MissingStore`] when no store was configured.
    pub fn build(self) -> Result<Loader<S, F>, CacheError> {
        validate_name(&self.name)?;
        if self.ttl < MIN_TTL {
            return Err(CacheError::TtlTooSmall(self.ttl));
        }
        let store = self.store.ok_or(CacheError::MissingStore)?;
        let lock = RaceLock::builder_shared(Arc::clone(&store))
            .key_prefix(self.lock_prefix)
            .check_lock_delay(self.check_lock_delay)
            .default_timeout(self.lock_timeout)
            .build();

        Ok(Loader {
            name: self.name,
            ttl: self.ttl,
            key_prefix: self.key_prefix,
            store,
            lock,
            source: Arc::new(self.source),
            offload: Offload::new(),
        })
    }
}
