//! Runtime configuration for a peercache node.
//!
//! Configuration is loaded from a JSON file or constructed
//! programmatically. Cluster membership, the cache budget, and ring tuning
//! all live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::http::pool::{DEFAULT_BASE_PATH, DEFAULT_REPLICAS};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "peercache", about = "Peer-distributed read-through cache node")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "node.json")]
    pub config: PathBuf,

    /// Override the peer-protocol listen address.
    #[arg(long)]
    pub listen: Option<String>,

    /// Override the client API listen address.
    #[arg(long)]
    pub api_listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bind address for the peer protocol (e.g. "127.0.0.1:8001").
    pub listen: String,

    /// Public base URL of this node; its identity on the hash ring.
    pub advertise: String,

    /// Base URLs of every node in the cluster, this one included.
    pub peers: Vec<String>,

    /// Bind address for the client-facing API; None disables it.
    pub api_listen: Option<String>,

    /// Local cache budget per group in bytes (0 = unbounded).
    pub cache_bytes: u64,

    /// Virtual nodes per peer on the hash ring.
    pub replicas: usize,

    /// URL prefix for the peer protocol.
    pub base_path: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8001".to_string(),
            advertise: "http://127.0.0.1:8001".to_string(),
            peers: vec!["http://127.0.0.1:8001".to_string()],
            api_listen: None,
            cache_bytes: 64 * 1024 * 1024, // 64 MiB
            replicas: DEFAULT_REPLICAS,
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: NodeConfig = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(NodeConfig::default())
        }
    }
}
