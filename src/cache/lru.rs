//! Byte-budgeted LRU store.
//!
//! The single-threaded core of the cache: an arena-backed doubly-linked
//! recency list plus a key index, giving O(1) lookup, touch, insert, and
//! eviction. Capacity is measured in bytes (key length plus value length
//! per entry), not entry count. Concurrency is layered on top by
//! [`crate::cache::store::ByteCache`].

use std::collections::HashMap;

use crate::cache::view::ByteView;

/// Callback invoked after an entry is evicted for space.
///
/// Runs for budget evictions only, never for updates in place.
pub type EvictHook = Box<dyn Fn(&str, &ByteView) + Send + Sync>;

struct Node {
    key: String,
    value: ByteView,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A size-bounded LRU cache over string keys and [`ByteView`] values.
///
/// `capacity_bytes == 0` means unbounded: nothing is ever evicted. An
/// entry larger on its own than a non-zero budget is rejected outright
/// instead of evicting every resident and failing anyway.
pub struct LruCache {
    capacity_bytes: u64,
    used_bytes: u64,
    index: HashMap<String, usize>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evict: Option<EvictHook>,
}

fn entry_size(key: &str, value: &ByteView) -> u64 {
    key.len() as u64 + value.len() as u64
}

impl LruCache {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            used_bytes: 0,
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            on_evict: None,
        }
    }

    /// Like [`LruCache::new`], with a hook observing every eviction.
    pub fn with_evict_hook(capacity_bytes: u64, hook: EvictHook) -> Self {
        let mut cache = Self::new(capacity_bytes);
        cache.on_evict = Some(hook);
        cache
    }

    /// Look up a key, marking it most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        let slot = *self.index.get(key)?;
        self.move_to_front(slot);
        self.nodes[slot].as_ref().map(|node| node.value.clone())
    }

    /// Insert or update an entry, then evict from the cold end while the
    /// budget is exceeded.
    ///
    /// Updating an existing key adjusts `used_bytes` by the size delta and
    /// refreshes the entry's recency.
    pub fn add(&mut self, key: &str, value: ByteView) {
        let size = entry_size(key, &value);
        if self.capacity_bytes != 0 && size > self.capacity_bytes {
            // Larger than the whole budget.
            return;
        }

        if let Some(&slot) = self.index.get(key) {
            if let Some(node) = self.nodes[slot].as_mut() {
                let old_size = entry_size(&node.key, &node.value);
                node.value = value;
                self.used_bytes = self.used_bytes - old_size + size;
            }
            self.move_to_front(slot);
        } else {
            let slot = self.alloc(Node {
                key: key.to_owned(),
                value,
                prev: None,
                next: None,
            });
            self.attach_front(slot);
            self.index.insert(key.to_owned(), slot);
            self.used_bytes += size;
        }

        while self.capacity_bytes != 0
            && self.used_bytes > self.capacity_bytes
            && self.tail.is_some()
        {
            self.evict_oldest();
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently accounted against the budget.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn evict_oldest(&mut self) {
        let Some(slot) = self.tail else { return };
        // Repair the list while the node is still in the arena, then take it.
        self.unlink(slot);
        if let Some(node) = self.nodes[slot].take() {
            self.index.remove(&node.key);
            self.used_bytes -= entry_size(&node.key, &node.value);
            self.free.push(slot);
            if let Some(hook) = &self.on_evict {
                hook(&node.key, &node.value);
            }
        }
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.attach_front(slot);
    }

    /// Detach a slot from the recency list, repairing its neighbors and the
    /// head/tail pointers. The node itself stays in the arena.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.nodes[slot].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[slot].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Place a node in the arena, reusing a freed slot when one exists.
    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_get_miss_then_hit() {
        let mut cache = LruCache::new(0);
        assert!(cache.get("k").is_none());

        cache.add("k", ByteView::from("v"));
        assert_eq!(cache.get("k"), Some(ByteView::from("v")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 2);
    }

    #[test]
    fn test_eviction_follows_insert_order() {
        // Each entry is 6 bytes; budget holds two.
        let mut cache = LruCache::new(12);
        cache.add("k1", ByteView::from("aaaa"));
        cache.add("k2", ByteView::from("bbbb"));
        assert_eq!(cache.used_bytes(), 12);

        cache.add("k3", ByteView::from("cccc"));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.used_bytes(), 12);

        cache.add("k4", ByteView::from("dddd"));
        assert!(cache.get("k2").is_none());
        assert_eq!(cache.get("k3"), Some(ByteView::from("cccc")));
        assert_eq!(cache.get("k4"), Some(ByteView::from("dddd")));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.used_bytes(), 12);
    }

    #[test]
    fn test_touch_refreshes_recency() {
        let mut cache = LruCache::new(12);
        cache.add("k1", ByteView::from("aaaa"));
        cache.add("k2", ByteView::from("bbbb"));

        // k1 becomes most recent, so k2 is now the coldest.
        assert!(cache.get("k1").is_some());

        cache.add("k3", ByteView::from("cccc"));
        assert!(cache.get("k2").is_none());
        assert!(cache.get("k1").is_some());
    }

    #[test]
    fn test_update_in_place_adjusts_used_bytes() {
        let mut cache = LruCache::new(0);
        cache.add("k", ByteView::from("val"));
        assert_eq!(cache.used_bytes(), 4);

        cache.add("k", ByteView::from("longer"));
        assert_eq!(cache.used_bytes(), 7);
        assert_eq!(cache.len(), 1);

        cache.add("k", ByteView::from("v"));
        assert_eq!(cache.used_bytes(), 2);
        assert_eq!(cache.get("k"), Some(ByteView::from("v")));
    }

    #[test]
    fn test_update_growing_over_budget_evicts_coldest() {
        let mut cache = LruCache::new(10);
        cache.add("a", ByteView::from("1234"));
        cache.add("b", ByteView::from("5678"));
        assert_eq!(cache.used_bytes(), 10);

        // Growing "a" makes it most recent and pushes "b" out.
        cache.add("a", ByteView::from("123456789"));
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(ByteView::from("123456789")));
        assert_eq!(cache.used_bytes(), 10);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let mut cache = LruCache::new(10);
        cache.add("a", ByteView::from("1"));

        cache.add("huge", ByteView::from("0123456789"));
        assert!(cache.get("huge").is_none());
        // Residents are untouched by the rejection.
        assert_eq!(cache.get("a"), Some(ByteView::from("1")));
        assert_eq!(cache.used_bytes(), 2);
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let mut cache = LruCache::new(0);
        for i in 0..100 {
            cache.add(&format!("key-{i}"), ByteView::from(vec![0u8; 1024]));
        }
        assert_eq!(cache.len(), 100);
        assert!(cache.used_bytes() > 100 * 1024);
    }

    #[test]
    fn test_evict_hook_sees_entries_coldest_first() {
        let evicted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log = evicted.clone();
        let mut cache = LruCache::with_evict_hook(
            12,
            Box::new(move |key, _value| log.lock().push(key.to_owned())),
        );

        cache.add("k1", ByteView::from("aaaa"));
        cache.add("k2", ByteView::from("bbbb"));
        cache.add("k3", ByteView::from("cccc"));
        cache.add("k4", ByteView::from("dddd"));

        assert_eq!(*evicted.lock(), vec!["k1".to_owned(), "k2".to_owned()]);
    }

    #[test]
    fn test_hook_not_called_for_update() {
        let count = Arc::new(Mutex::new(0usize));
        let calls = count.clone();
        let mut cache =
            LruCache::with_evict_hook(0, Box::new(move |_, _| *calls.lock() += 1));

        cache.add("k", ByteView::from("old"));
        cache.add("k", ByteView::from("new"));
        assert_eq!(*count.lock(), 0);
    }
}
