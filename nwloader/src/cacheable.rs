//! Decorator form of the loader.
//!
//! [`Cacheable`] wraps an async function into a callable with the same
//! signature whose invocations are routed through a pre-built [`Loader`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use nwloader_store::KeyStore;

use crate::error::CacheError;
use crate::loader::{DEFAULT_KEY_PREFIX, DEFAULT_TTL, Loader};
use crate::source::{BoxError, FnSource, source_fn};

/// Builder that decorates an async function with read-through caching.
///
/// ```no_run
/// use nwloader::{BoxError, Cacheable};
/// use nwloader_store::RedisStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisStore::builder().url("redis://localhost:6379/").build()?;
///
/// let fetch_user = Cacheable::new("users")
///     .store(store)
///     .wrap(|id: String| async move {
///         Ok::<_, BoxError>(format!("user {id}"))
///     })?;
///
/// let user = fetch_user.call("u1".to_owned()).await?;
/// # Ok(())
/// # }
/// ```
pub struct Cacheable<S> {
    name: String,
    store: Option<Arc<S>>,
    ttl: Duration,
    key_prefix: String,
}

impl<S: KeyStore> Cacheable<S> {
    /// Starts decorating under the given loader name.
    pub fn new(name: impl Into<String>) -> Self {
        Cacheable {
            name: name.into(),
            store: None,
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
        }
    }

    /// Sets the key-value store. Required.
    pub fn store(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets the store from an already shared handle.
    pub fn shared_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the freshness threshold. Default: 30 s.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the namespace for data keys. Default: `"nwloader"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Wraps `fetch`, returning the cached callable.
    ///
    /// # Errors
    ///
    /// [`CacheError::MissingStore`] when no store was supplied, plus the
    /// loader's own construction errors (invalid name, TTL too small).
    pub fn wrap<A, V, F, Fut>(self, fetch: F) -> Result<Cached<S, A, V>, CacheError>
    where
        A: Serialize + Clone + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
    {
        let store = self.store.ok_or(CacheError::MissingStore)?;
        let loader = Loader::builder(self.name, source_fn(fetch))
            .shared_store(store)
            .ttl(self.ttl)
            .key_prefix(self.key_prefix)
            .build()?;
        Ok(Cached { loader })
    }
}

/// An async function decorated with read-through caching.
pub struct Cached<S, A, V> {
    loader: Loader<S, FnSource<A, V>>,
}

impl<S, A, V> Cached<S, A, V>
where
    S: KeyStore,
    A: Serialize + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Invokes the decorated function through the cache.
    pub async fn call(&self, args: A) -> Result<V, CacheError> {
        self.loader.load(args).await
    }

    /// Removes the cached entry for `key`.
    pub async fn clear<K>(&self, key: &K) -> Result<u64, CacheError>
    where
        K: Serialize + ?Sized,
    {
        self.loader.clear(key).await
    }

    /// Stores `value` for `key` without invoking the wrapped function.
    pub async fn prime<K>(&self, key: &K, value: &V) -> Result<bool, CacheError>
    where
        K: Serialize + ?Sized,
    {
        self.loader.prime(key, value).await
    }

    /// The underlying loader.
    pub fn loader(&self) -> &Loader<S, FnSource<A, V>> {
        &self.loader
    }
}
