//! Chat command: runs one interactive peer against a relay.

use crate::config::ClientConfig;
use crate::console::StdConsole;
use crate::engine::PeerEngine;
use crate::error::ClientResult;
use crate::socket::UdpTransport;

/// Connects to the relay and runs the peer until the user exits.
pub async fn run(
    config: &ClientConfig,
    relay: Option<String>,
    name: Option<String>,
) -> ClientResult<()> {
    let mut peer_config = config.peer.to_peer_config();
    if let Some(relay) = relay {
        peer_config = peer_config.with_relay(relay);
    }
    if let Some(name) = name {
        peer_config = peer_config.with_name(name);
    }

    let transport = UdpTransport::connect(&peer_config.relay).await?;
    let console = StdConsole::spawn();
    PeerEngine::new(transport, console, peer_config).run().await
}
