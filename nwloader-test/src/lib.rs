#![doc = include_str!("../README.md")]

pub mod mock_store;
pub mod source;

pub use crate::mock_store::{MemoryStore, StoreCounters};
pub use crate::source::CountingSource;
