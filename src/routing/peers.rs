//! Peer capability traits.
//!
//! The group orchestration layer in [`crate::group`] speaks to remote
//! peers only through these two traits, so the transport (HTTP here,
//! anything else elsewhere) stays swappable and tests can stub peers
//! without a network.

use std::sync::Arc;

use async_trait::async_trait;

/// Fetches one value from one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Ask the peer for `key` within `group`, returning the raw value
    /// bytes. Any transport or remote-side failure is an error; the caller
    /// decides whether to fall back.
    async fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Routes a key to the peer responsible for it.
pub trait PeerPicker: Send + Sync {
    /// The getter for the peer owning `key`, or None when this process
    /// should load the key itself (it is the owner, or no peers are
    /// configured).
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
