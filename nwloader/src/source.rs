//! The user-loader seam.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Boxed error produced by user loader sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A source of fresh values for cache keys.
///
/// `Args` is what the source is keyed and invoked with; `Value` must
/// round-trip through JSON because that is the store's wire format. The
/// cache never interrupts a fetch: a slow source delays its own callers
/// but holds no locks beyond the store-side lock expiry.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// Argument type the cache key is derived from.
    type Args: Serialize + Clone + Send + Sync + 'static;
    /// Payload type stored under the key.
    type Value: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Produces a fresh value for `args`.
    async fn fetch(&self, args: &Self::Args) -> Result<Self::Value, BoxError>;
}

/// A [`Source`] backed by an async closure. Built with [`source_fn`].
pub struct FnSource<A, V> {
    fetch: Box<dyn Fn(A) -> BoxFuture<'static, Result<V, BoxError>> + Send + Sync>,
}

impl<A, V> fmt::Debug for FnSource<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").finish_non_exhaustive()
    }
}

/// Wraps an async closure into a [`Source`].
///
/// ```
/// use nwloader::{BoxError, source_fn};
///
/// let source = source_fn(|id: u64| async move {
///     Ok::<_, BoxError>(format!("user-{id}"))
/// });
/// ```
pub fn source_fn<A, V, F, Fut>(fetch: F) -> FnSource<A, V>
where
    A: Serialize + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
{
    FnSource {
        fetch: Box::new(move |args| Box::pin(fetch(args))),
    }
}

#[async_trait]
impl<A, V> Source for FnSource<A, V>
where
    A: Serialize + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Args = A;
    type Value = V;

    async fn fetch(&self, args: &A) -> Result<V, BoxError> {
        (self.fetch)(args.clone()).await
    }
}
