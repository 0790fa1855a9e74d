//! peercache node: one peer of the distributed cache.
//!
//! Runs the HTTP pool (peer protocol) and, when configured, a small
//! client-facing API:
//!   GET /api?key=K   look up K in the demo "scores" group
//!   GET /health      liveness and uptime
//!   GET /stats       per-group counter snapshots
//!
//! Values come from the local store, the owning peer, or the loader, in
//! that order.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use peercache::config::{Cli, NodeConfig};
use peercache::group::{GetError, Group, LoaderFn, Registry};
use peercache::http::pool::HttpPool;
use peercache::stats::StatsSnapshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "peercache=debug,tower_http=debug"
    } else {
        "peercache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("peercache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, applying CLI overrides.
    let mut config = NodeConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(api_listen) = cli.api_listen {
        config.api_listen = Some(api_listen);
    }

    info!(
        listen = %config.listen,
        advertise = %config.advertise,
        peers = config.peers.len(),
        cache_bytes = config.cache_bytes,
        "Configuration loaded"
    );

    // The demo "scores" group, backed by the slow in-process db.
    let registry = Arc::new(Registry::new());
    let group = registry.new_group(
        "scores",
        config.cache_bytes,
        Arc::new(LoaderFn::new(slow_db_load)),
    );

    // Wire the group into the cluster.
    let pool = Arc::new(HttpPool::configured(
        config.advertise.clone(),
        registry.clone(),
        config.base_path.clone(),
        config.replicas,
    ));
    pool.set_peers(&config.peers);
    group.register_peer_picker(pool.clone());

    // Client-facing API, when enabled.
    if let Some(api_addr) = config.api_listen.clone() {
        let state = ApiState {
            group: group.clone(),
            registry: registry.clone(),
            start_time: Instant::now(),
        };
        let api = api_router(state).layer(TraceLayer::new_for_http());
        let listener = TcpListener::bind(&api_addr).await?;
        info!(addr = %api_addr, "API server listening");
        tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, api).await {
                error!(%error, "API server exited");
            }
        });
    }

    // Peer protocol server.
    let app = pool.router().layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(&config.listen).await?;
    info!(addr = %config.listen, "Peer server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Stand-in for a slow backing database.
async fn slow_db_load(key: String) -> anyhow::Result<Vec<u8>> {
    info!(key = %key, "Slow db lookup");
    match key.as_str() {
        "Tom" => Ok(b"630".to_vec()),
        "Jack" => Ok(b"589".to_vec()),
        "Sam" => Ok(b"567".to_vec()),
        _ => anyhow::bail!("no record for {key} in scores db"),
    }
}

// ─── Client API ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct ApiState {
    group: Arc<Group>,
    registry: Arc<Registry>,
    start_time: Instant,
}

fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api", get(api_get))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ApiParams {
    key: String,
}

async fn api_get(State(state): State<ApiState>, Query(params): Query<ApiParams>) -> Response {
    match state.group.get(&params.key).await {
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

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Per-group statistics response.
#[derive(Debug, Serialize)]
struct GroupStatsResponse {
    name: String,
    cache_len: usize,
    cache_used_bytes: u64,
    #[serde(flatten)]
    counters: StatsSnapshot,
}

async fn stats(State(state): State<ApiState>) -> Json<Vec<GroupStatsResponse>> {
    let groups = state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| state.registry.get(&name))
        .map(|group| GroupStatsResponse {
            name: group.name().to_string(),
            cache_len: group.cache_len(),
            cache_used_bytes: group.cache_used_bytes(),
            counters: group.stats(),
        })
        .collect();
    Json(groups)
}
