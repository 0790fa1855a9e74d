//! Integration tests for group lookup orchestration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Barrier;
use tokio::time::timeout;

use peercache::group::{Group, Loader};
use peercache::routing::peers::{PeerGetter, PeerPicker};

/// Loader over a fixed table, counting invocations.
struct CountingLoader {
    db: HashMap<&'static str, &'static str>,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingLoader {
    fn scores() -> Self {
        Self {
            db: HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader for CountingLoader {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.db.get(key) {
            Some(value) => Ok(value.as_bytes().to_vec()),
            None => anyhow::bail!("{key} not in db"),
        }
    }
}

#[tokio::test]
async fn test_read_through_then_memoized() {
    let loader = Arc::new(CountingLoader::scores());
    let group = Group::new("scores", 2 << 10, loader.clone());

    let view = group.get("Tom").await.unwrap();
    assert_eq!(view.to_string(), "630");
    assert_eq!(loader.calls(), 1);

    // Second lookup is a local hit; the loader stays untouched.
    let view = group.get("Tom").await.unwrap();
    assert_eq!(view.to_string(), "630");
    assert_eq!(loader.calls(), 1);

    let stats = group.stats();
    assert_eq!(stats.gets, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.loads_deduped, 1);
    assert_eq!(stats.local_loads, 1);
}

#[tokio::test]
async fn test_missing_key_error_not_cached() {
    let loader = Arc::new(CountingLoader::scores());
    let group = Group::new("scores", 2 << 10, loader.clone());

    assert!(group.get("Unknown").await.is_err());
    assert!(group.get("Unknown").await.is_err());

    // No negative caching: both lookups reached the loader.
    assert_eq!(loader.calls(), 2);
    assert_eq!(group.cache_len(), 0);
    assert_eq!(group.stats().local_load_errors, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_gets_share_one_load() {
    let loader = Arc::new(CountingLoader::scores().slow(Duration::from_millis(100)));
    let group = Arc::new(Group::new("scores", 2 << 10, loader.clone()));

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let group = group.clone();
            tokio::spawn(async move { group.get("Tom").await })
        })
        .collect();

    for joined in join_all(tasks).await {
        assert_eq!(joined.unwrap().unwrap().to_string(), "630");
    }

    assert_eq!(loader.calls(), 1);
    let stats = group.stats();
    assert_eq!(stats.gets, 50);
    assert_eq!(stats.loads_deduped, 1);
    assert_eq!(stats.local_loads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_share_one_error() {
    let loader = Arc::new(CountingLoader::scores().slow(Duration::from_millis(100)));
    let group = Arc::new(Group::new("scores", 0, loader.clone()));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let group = group.clone();
            tokio::spawn(async move { group.get("Nobody").await })
        })
        .collect();

    for joined in join_all(tasks).await {
        let err = joined.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Nobody not in db");
    }
    assert_eq!(loader.calls(), 1);
}

/// Loader that parks every call on a shared barrier.
struct BarrierLoader {
    barrier: Barrier,
}

#[async_trait]
impl Loader for BarrierLoader {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.barrier.wait().await;
        Ok(key.as_bytes().to_vec())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_load_concurrently() {
    let group = Arc::new(Group::new(
        "g",
        0,
        Arc::new(BarrierLoader {
            barrier: Barrier::new(2),
        }),
    ));

    let a = {
        let group = group.clone();
        tokio::spawn(async move { group.get("a").await })
    };
    let b = {
        let group = group.clone();
        tokio::spawn(async move { group.get("b").await })
    };

    // Completes only if both loads run at the same time.
    let (ra, rb) = timeout(Duration::from_secs(5), async {
        (a.await.unwrap(), b.await.unwrap())
    })
    .await
    .expect("independent keys must not serialize");
    assert_eq!(ra.unwrap().to_string(), "a");
    assert_eq!(rb.unwrap().to_string(), "b");
}

/// Peer stub that answers every fetch with a marker value.
struct StaticPeer;

#[async_trait]
impl PeerGetter for StaticPeer {
    async fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        Ok(format!("{group}/{key}@peer").into_bytes())
    }
}

struct StaticPicker;

impl PeerPicker for StaticPicker {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        Some(Arc::new(StaticPeer))
    }
}

#[tokio::test]
async fn test_remote_hit_is_cached_locally() {
    let loader = Arc::new(CountingLoader::scores());
    let group = Group::new("scores", 2 << 10, loader.clone());
    group.register_peer_picker(Arc::new(StaticPicker));

    let view = group.get("Tom").await.unwrap();
    assert_eq!(view.to_string(), "scores/Tom@peer");
    assert_eq!(loader.calls(), 0);
    assert_eq!(group.cache_len(), 1);

    // The memoized peer value answers the second lookup.
    let again = group.get("Tom").await.unwrap();
    assert_eq!(again.to_string(), "scores/Tom@peer");
    let stats = group.stats();
    assert_eq!(stats.peer_loads, 1);
    assert_eq!(stats.cache_hits, 1);
}

/// Peer stub that always fails.
struct FailingPeer;

#[async_trait]
impl PeerGetter for FailingPeer {
    async fn fetch(&self, _group: &str, _key: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("connection refused")
    }
}

struct FailingPicker;

impl PeerPicker for FailingPicker {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        Some(Arc::new(FailingPeer))
    }
}

#[tokio::test]
async fn test_peer_failure_falls_back_to_loader() {
    let loader = Arc::new(CountingLoader::scores());
    let group = Group::new("scores", 2 << 10, loader.clone());
    group.register_peer_picker(Arc::new(FailingPicker));

    let view = group.get("Sam").await.unwrap();
    assert_eq!(view.to_string(), "567");
    assert_eq!(loader.calls(), 1);

    let stats = group.stats();
    assert_eq!(stats.peer_errors, 1);
    assert_eq!(stats.peer_loads, 0);
    assert_eq!(stats.local_loads, 1);

    // The fallback value was cached, so the broken peer is not retried.
    let view = group.get("Sam").await.unwrap();
    assert_eq!(view.to_string(), "567");
    assert_eq!(group.stats().peer_errors, 1);
}
