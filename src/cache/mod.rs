//! Local cache storage.
//!
//! This module contains the in-process half of the cache:
//! - [`view`]: ByteView, the immutable value type
//! - [`lru`]: byte-budgeted LRU store with an optional eviction hook
//! - [`store`]: the mutex-guarded, lazily built wrapper each group owns

pub mod lru;
pub mod store;
pub mod view;
