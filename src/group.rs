//! Cache groups and the read-through lookup protocol.
//!
//! A [`Group`] is one namespace: a local byte-budgeted store, a [`Loader`]
//! as the source of truth, and optionally a peer picker for distributed
//! operation. `Group::get` resolves a key by local hit, then one coalesced
//! load per key which asks the owning peer first and falls back to the
//! local loader. The [`Registry`] holds a process's groups by name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::store::ByteCache;
use crate::cache::view::ByteView;
use crate::routing::peers::PeerPicker;
use crate::singleflight::SingleFlight;
use crate::stats::{GroupStats, StatsSnapshot};

/// Source of truth for a group's values.
///
/// Called only when a key is absent from the local store and no peer
/// could supply it.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// [`Loader`] adapter for plain async functions and closures.
pub struct LoaderFn {
    f: Box<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> + Send + Sync>,
}

impl LoaderFn {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        Self {
            f: Box::new(move |key| Box::pin(f(key))),
        }
    }
}

#[async_trait]
impl Loader for LoaderFn {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.f)(key.to_owned()).await
    }
}

/// Error returned by [`Group::get`].
///
/// Clone, because coalesced callers all receive the same outcome.
#[derive(Debug, Clone, Error)]
pub enum GetError {
    /// The empty key is never valid.
    #[error("key must not be empty")]
    EmptyKey,
    /// The loader failed. The loader's own error is carried through
    /// unchanged; peer failures are never surfaced here.
    #[error("{0}")]
    Load(Arc<anyhow::Error>),
}

/// One cache namespace.
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    cache: ByteCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: SingleFlight<ByteView, GetError>,
    stats: GroupStats,
}

impl Group {
    /// A standalone group. Most callers go through [`Registry::new_group`].
    pub fn new(name: impl Into<String>, cache_bytes: u64, loader: Arc<dyn Loader>) -> Self {
        Self {
            name: name.into(),
            loader,
            cache: ByteCache::new(cache_bytes),
            peers: OnceLock::new(),
            flight: SingleFlight::new(),
            stats: GroupStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire in the peer picker.
    ///
    /// # Panics
    ///
    /// Panics if a picker is already registered for this group.
    pub fn register_peer_picker(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("peer picker already registered for group {:?}", self.name);
        }
    }

    /// Read-through lookup.
    ///
    /// Returns the locally cached value when present. On a miss, at most
    /// one load per key runs at a time; concurrent callers for the same
    /// key share its outcome. A load asks the owning peer when one exists,
    /// falling back to the local loader on any peer failure, and caches
    /// whatever it obtained before returning.
    pub async fn get(&self, key: &str) -> Result<ByteView, GetError> {
        self.stats.gets.inc();
        if key.is_empty() {
            return Err(GetError::EmptyKey);
        }

        if let Some(view) = self.cache.get(key) {
            self.stats.cache_hits.inc();
            debug!(group = %self.name, key, "cache hit");
            return Ok(view);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView, GetError> {
        self.stats.loads.inc();
        self.flight
            .run(key, async {
                self.stats.loads_deduped.inc();

                if let Some(picker) = self.peers.get() {
                    if let Some(peer) = picker.pick_peer(key) {
                        match peer.fetch(&self.name, key).await {
                            Ok(bytes) => {
                                self.stats.peer_loads.inc();
                                let view = ByteView::from(bytes);
                                self.cache.add(key, view.clone());
                                debug!(group = %self.name, key, "loaded from peer");
                                return Ok(view);
                            }
                            Err(error) => {
                                self.stats.peer_errors.inc();
                                warn!(
                                    group = %self.name,
                                    key,
                                    %error,
                                    "peer fetch failed, loading locally"
                                );
                            }
                        }
                    }
                }

                self.load_locally(key).await
            })
            .await
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView, GetError> {
        match self.loader.load(key).await {
            Ok(bytes) => {
                self.stats.local_loads.inc();
                let view = ByteView::from(bytes);
                self.cache.add(key, view.clone());
                Ok(view)
            }
            Err(error) => {
                self.stats.local_load_errors.inc();
                Err(GetError::Load(Arc::new(error)))
            }
        }
    }

    /// Counter snapshot for monitoring.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Entries currently in the local store.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Bytes currently held by the local store.
    pub fn cache_used_bytes(&self) -> u64 {
        self.cache.used_bytes()
    }
}

/// The named groups of one process.
///
/// Creating a group under an existing name replaces the previous
/// registration; lookups always see the latest.
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group and register it under its name.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        loader: Arc<dyn Loader>,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), cache_bytes, loader));
        if self
            .groups
            .write()
            .insert(name.clone(), group.clone())
            .is_some()
        {
            warn!(group = %name, "replaced existing group registration");
        }
        group
    }

    /// Look up a group by name.
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Names of all registered groups, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}
