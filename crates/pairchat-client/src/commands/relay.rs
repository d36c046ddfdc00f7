//! Relay command: runs the relay in the foreground until SIGTERM/SIGINT.

use std::net::SocketAddr;

use tracing::info;

use pairchat_server::{RelayHandler, RelaySocket, SignalHandler};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Starts the relay. Command-line overrides win over the config file.
pub async fn run(
    config: &ClientConfig,
    bind: Option<SocketAddr>,
    max_peers: Option<u16>,
) -> ClientResult<()> {
    let mut relay_config = config.relay.to_relay_config();
    if let Some(bind) = bind {
        relay_config.bind = bind;
    }
    if let Some(max_peers) = max_peers {
        relay_config = relay_config.with_max_peers(max_peers);
    }

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();

    let socket = RelaySocket::bind(&relay_config).await?;
    let mut handler = RelayHandler::new(&relay_config);
    info!(pending_timeout = ?relay_config.pending_timeout, "Relay ready");

    socket
        .run_until_shutdown(&mut handler, signal_handler.shutdown().wait())
        .await?;
    Ok(())
}
