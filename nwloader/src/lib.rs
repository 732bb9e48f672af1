#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Decorator form: wrap an async function into a cached callable.
pub mod cacheable;

/// The stored cache entry and its JSON wire shape.
pub mod entry;

/// Error types for cache operations.
///
/// Defines [`CacheError`], which covers construction-time validation,
/// store failures, encoding failures, and annotated loader failures.
pub mod error;

/// Freshness inference from store-side TTLs.
///
/// A data key's remaining TTL against the configured threshold decides
/// whether a hit is served as-is or served stale while a refresh runs.
pub mod freshness;

/// Cache key derivation and loader name validation.
pub mod key;

/// Background task tracking for stale-while-revalidate refreshes.
pub mod offload;

/// The user-loader seam.
///
/// [`Source`] produces fresh values for cache keys; [`source_fn`] adapts
/// an async closure into one.
pub mod source;

/// The cache-refresh orchestrator.
pub mod loader;

pub use cacheable::{Cacheable, Cached};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use freshness::{Freshness, freshness_of};
pub use key::derive_key;
pub use loader::{DEFAULT_KEY_PREFIX, DEFAULT_TTL, Loader, LoaderBuilder, MIN_TTL};
pub use offload::Offload;
pub use source::{BoxError, FnSource, Source, source_fn};
