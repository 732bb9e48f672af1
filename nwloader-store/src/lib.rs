#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod store;

#[doc(inline)]
pub use crate::backend::{RedisStore, RedisStoreBuilder};
#[doc(inline)]
pub use crate::error::StoreError;
#[doc(inline)]
pub use crate::store::{KeyStore, SetMode, SetStatus, StoreResult, Ttl};

/// Token-guarded delete, the only script evaluated by this workspace.
///
/// `KEYS[1]` is the lock key, `ARGV[1]` the token written by the acquirer.
/// The guard ensures a holder whose lock already expired cannot delete a
/// successor's lock: the `GET` comparison and the `DEL` run atomically, and
/// the `DEL` happens only when the stored token still belongs to the caller.
/// Returns the number of deleted keys (1 on release, 0 otherwise).
pub const DEL_IF_MATCH_SCRIPT: &str = r#"if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
else
  return 0
end"#;
