//! Consistent-hash ring with virtual nodes.
//!
//! Each peer is hashed onto the ring at `replicas` positions, derived from
//! the replica index concatenated with the peer id. A key is owned by the
//! first position clockwise from the key's own hash, wrapping past the end
//! of the sorted position list. Virtual nodes smooth the key distribution
//! so that adding or removing one peer only remaps a small share of keys.

use std::collections::HashMap;

/// Hash function mapping arbitrary bytes onto the ring's u32 space.
pub type RingHashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// A consistent-hash ring mapping keys to peer ids.
pub struct HashRing {
    replicas: usize,
    positions: Vec<u32>,
    owners: HashMap<u32, String>,
    hash: RingHashFn,
}

impl HashRing {
    /// A ring using crc32 (IEEE) as its hash.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Box::new(crc32fast::hash))
    }

    /// A ring with a caller-supplied hash, for tests and custom layouts.
    pub fn with_hasher(replicas: usize, hash: RingHashFn) -> Self {
        Self {
            replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
            hash,
        }
    }

    /// Add peers to the ring, placing `replicas` virtual nodes for each.
    ///
    /// Additive only; the id→ring tables in [`crate::http::pool::HttpPool`]
    /// replace the whole ring when membership changes.
    pub fn add<S: AsRef<str>>(&mut self, peers: &[S]) {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{peer}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, peer.to_owned());
            }
        }
        self.positions.sort_unstable();
    }

    /// The peer owning `key`, or None if the ring is empty.
    ///
    /// Deterministic: the same key on the same membership always maps to
    /// the same peer.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        // First position at or clockwise of the key's hash, wrapping.
        let idx = self.positions.partition_point(|&p| p < hash);
        let idx = if idx == self.positions.len() { 0 } else { idx };
        self.owners.get(&self.positions[idx]).map(String::as_str)
    }

    /// Number of virtual-node positions on the ring.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
