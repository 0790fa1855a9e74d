//! peercache: a peer-distributed, read-through, in-process cache.
//!
//! Cache data is namespaced into groups. A group resolves a key from its
//! local byte-budgeted LRU store, from the peer that owns the key under
//! consistent hashing, or from the application's loader, in that order;
//! concurrent lookups for the same key share a single load.
//!
//! Module map:
//! - [`cache`]: ByteView values, the LRU store, and its guarded wrapper
//! - [`routing`]: the consistent-hash ring and the peer capability traits
//! - [`singleflight`]: duplicate call suppression
//! - [`group`]: lookup orchestration and the group registry
//! - [`http`]: HTTP transport binding the above into a cluster
//! - [`config`]: node CLI and configuration file
//! - [`stats`]: per-group lookup counters

pub mod cache;
pub mod config;
pub mod group;
pub mod http;
pub mod routing;
pub mod singleflight;
pub mod stats;
