//! Core types: peer identifiers and tracing setup

pub mod peer;
pub mod tracing;

pub use peer::{PeerId, PeerIdError, PEER_ID_PREFIX};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
