#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod error;
pub mod lock;

#[doc(inline)]
pub use crate::error::LockError;
#[doc(inline)]
pub use crate::lock::{
    DEFAULT_CHECK_LOCK_DELAY, DEFAULT_KEY_PREFIX, DEFAULT_TIMEOUT, RaceLock, RaceLockBuilder,
    RaceOutcome,
};
