//! HTTP peer server and picker.
//!
//! [`HttpPool`] is one node's transport: it serves this process's groups
//! to peers under `GET {base_path}/{group}/{key}` and, as a
//! [`PeerPicker`], routes outbound lookups through a consistent-hash ring
//! over the configured peer set. [`HttpPool::set_peers`] replaces the ring
//! and client table wholesale, so a concurrent pick observes either the
//! old membership or the new one, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::group::{GetError, Registry};
use crate::http::client::HttpClient;
use crate::routing::peers::{PeerGetter, PeerPicker};
use crate::routing::ring::HashRing;

/// Default URL prefix namespacing the peer protocol.
pub const DEFAULT_BASE_PATH: &str = "/_peercache";
/// Default virtual nodes per peer.
pub const DEFAULT_REPLICAS: usize = 50;

/// Routing tables swapped as a unit by [`HttpPool::set_peers`].
struct PoolRoutes {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpClient>>,
}

/// One node's HTTP transport, server side and client side.
pub struct HttpPool {
    advertise: String,
    base_path: String,
    replicas: usize,
    registry: Arc<Registry>,
    http: reqwest::Client,
    routes: RwLock<PoolRoutes>,
}

impl HttpPool {
    /// A pool with the default base path and replica count.
    pub fn new(advertise: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self::configured(advertise, registry, DEFAULT_BASE_PATH, DEFAULT_REPLICAS)
    }

    /// A pool with an explicit base path and virtual-node count.
    ///
    /// `advertise` is this node's public base URL and its identity on the
    /// ring; it must match the entry other nodes carry in their peer sets.
    pub fn configured(
        advertise: impl Into<String>,
        registry: Arc<Registry>,
        base_path: impl Into<String>,
        replicas: usize,
    ) -> Self {
        Self {
            advertise: advertise.into(),
            base_path: base_path.into(),
            replicas,
            registry,
            http: reqwest::Client::new(),
            routes: RwLock::new(PoolRoutes {
                ring: HashRing::new(replicas),
                getters: HashMap::new(),
            }),
        }
    }

    pub fn advertise(&self) -> &str {
        &self.advertise
    }

    /// Replace the peer set, rebuilding the ring and the client table.
    ///
    /// `peers` are base URLs like `http://10.0.0.2:8001` and normally
    /// include this node's own advertise URL.
    pub fn set_peers<S: AsRef<str>>(&self, peers: &[S]) {
        let mut ring = HashRing::new(self.replicas);
        ring.add(peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let peer = peer.as_ref().to_owned();
                let client = Arc::new(HttpClient::new(
                    format!("{}{}", peer, self.base_path),
                    self.http.clone(),
                ));
                (peer, client)
            })
            .collect();

        let mut routes = self.routes.write();
        routes.ring = ring;
        routes.getters = getters;
        drop(routes);

        info!(node = %self.advertise, peers = peers.len(), "peer set replaced");
    }

    /// Router serving this node's groups to its peers.
    pub fn router(self: Arc<Self>) -> Router {
        let base_path = self.base_path.clone();
        let peer_routes = Router::new()
            .route("/{group}/{key}", get(serve_value))
            .with_state(self);
        Router::new().nest(&base_path, peer_routes)
    }
}

impl PeerPicker for HttpPool {
    /// The owning peer's client, or None when this node owns the key or
    /// no peers are configured.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let routes = self.routes.read();
        let owner = routes.ring.get(key)?;
        if owner == self.advertise {
            return None;
        }
        let getter = routes.getters.get(owner)?.clone();
        debug!(node = %self.advertise, key, peer = %owner, "picked peer");
        Some(getter)
    }
}

// ─── Peer Protocol Handler ─────────────────────────────────────────────────

async fn serve_value(
    State(pool): State<Arc<HttpPool>>,
    Path((group, key)): Path<(String, String)>,
) -> Response {
    debug!(node = %pool.advertise, group = %group, key = %key, "peer request");

    let Some(found) = pool.registry.get(&group) else {
        return (StatusCode::NOT_FOUND, format!("no such group: {group}")).into_response();
    };

    match found.get(&key).await {
        Ok(view) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_bytes(),
        )
            .into_response(),
        Err(err @ GetError::EmptyKey) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err @ GetError::Load(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
