//! Concurrency-safe cache wrapper.
//!
//! [`ByteCache`] guards one [`LruCache`] behind a mutex and constructs it
//! lazily, so a group that never stores anything never allocates a store.
//! Critical sections cover a single lookup or insert and are never held
//! across an await point.

use parking_lot::Mutex;

use crate::cache::lru::LruCache;
use crate::cache::view::ByteView;

/// A mutex-guarded, lazily initialized LRU store.
///
/// Every operation takes the lock for the duration of that operation only.
/// The recency update inside [`LruCache::get`] mutates the list, which is
/// why reads lock exclusively too.
pub struct ByteCache {
    capacity_bytes: u64,
    inner: Mutex<Option<LruCache>>,
}

impl ByteCache {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            inner: Mutex::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.inner.lock();
        let lru = guard.get_or_insert_with(|| LruCache::new(self.capacity_bytes));
        lru.get(key)
    }

    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.inner.lock();
        let lru = guard.get_or_insert_with(|| LruCache::new(self.capacity_bytes));
        lru.add(key, value);
    }

    /// Number of live entries; 0 before first use.
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes accounted against the budget; 0 before first use.
    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, LruCache::used_bytes)
    }
}
