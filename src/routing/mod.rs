//! Key-to-peer routing.
//!
//! - [`ring`]: consistent-hash ring with virtual nodes
//! - [`peers`]: the PeerPicker/PeerGetter seam between orchestration and
//!   transport

pub mod peers;
pub mod ring;
