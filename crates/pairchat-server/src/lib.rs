//! Relay: slot allocation, pairing directory, message buffering.
//!
//! The relay hands out a bounded number of peer slots, lets peers browse
//! each other and negotiate one-to-one sessions, and carries chat payloads
//! through a one-at-a-time acknowledgement cycle.
//!
//! - [`SlotAllocator`]: LIFO free-list of peer ids
//! - [`Directory`]: registrations, nicknames, link states, buffered payloads
//! - [`RelayHandler`]: protocol engine, request in, addressed replies out
//! - [`RelaySocket`]: UDP loop feeding the handler
//!
//! # Example
//!
//! ```rust,no_run
//! use pairchat_server::{RelayConfig, RelayHandler, RelaySocket, SignalHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::default();
//!     let socket = RelaySocket::bind(&config).await?;
//!     let mut handler = RelayHandler::new(&config);
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     socket.run_until_shutdown(&mut handler, signals.shutdown().wait()).await?;
//!     Ok(())
//! }
//! ```

mod buffer;
mod config;
mod directory;
mod error;
mod handler;
mod signals;
mod slots;
mod socket;

pub use buffer::{MessageBuffer, PendingMessage};
pub use config::{DEFAULT_MAX_PEERS, RelayConfig, default_bind_addr};
pub use directory::{Departure, Directory, LinkState, PeerSlot};
pub use error::{ServerError, ServerResult};
pub use handler::{Outbound, RelayHandler};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use slots::SlotAllocator;
pub use socket::RelaySocket;
