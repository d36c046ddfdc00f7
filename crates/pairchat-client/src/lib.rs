//! CLI, peer protocol engine, UDP transport, console
//!
//! This crate provides the `pairchat` command-line interface. `pairchat
//! relay` runs the relay from `pairchat-server`; `pairchat chat` runs an
//! interactive peer through [`PeerEngine`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod session;
pub mod socket;

#[cfg(test)]
mod testing;

pub use cli::Cli;
pub use engine::{PeerEngine, PeerEvent, PeerState};
pub use error::{ClientError, ClientResult};
pub use socket::{Transport, UdpTransport};
