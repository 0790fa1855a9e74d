//! HTTP transport for the peer protocol.
//!
//! - [`pool`]: the server side plus the ring-backed peer picker
//! - [`client`]: the reqwest-based getter one node holds per peer

pub mod client;
pub mod pool;
