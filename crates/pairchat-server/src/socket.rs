//! UDP relay loop.
//!
//! One task owns the socket and the [`RelayHandler`]; datagrams are
//! processed strictly one at a time. Send and receive failures are logged
//! and the loop keeps going.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use pairchat_protocol::{MAX_DATAGRAM_SIZE, decode_request, encode_datagram};

use crate::config::RelayConfig;
use crate::error::ServerResult;
use crate::handler::{Outbound, RelayHandler};

/// The relay's datagram endpoint.
pub struct RelaySocket {
    socket: UdpSocket,
}

impl RelaySocket {
    /// Binds the relay to the configured address.
    pub async fn bind(config: &RelayConfig) -> ServerResult<Self> {
        config.validate()?;
        let socket = UdpSocket::bind(config.bind).await?;
        info!(
            addr = %socket.local_addr()?,
            max_peers = config.max_peers,
            "Relay listening"
        );
        Ok(Self { socket })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Runs the receive loop forever.
    pub async fn run(&self, handler: &mut RelayHandler) -> ServerResult<()> {
        // One spare byte detects datagrams over the limit instead of
        // silently truncating them.
        let mut buf = [0u8; MAX_DATAGRAM_SIZE + 1];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "Failed to receive datagram");
                    continue;
                }
            };

            let request = match decode_request(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    warn!(addr = %from, error = %e, "Malformed datagram dropped");
                    continue;
                }
            };
            debug!(addr = %from, command = request.command(), "Datagram received");

            for outbound in handler.handle(from, request, Instant::now()) {
                self.send(outbound).await;
            }
        }
    }

    /// Runs the receive loop until `shutdown` completes.
    pub async fn run_until_shutdown<S>(&self, handler: &mut RelayHandler, shutdown: S) -> ServerResult<()>
    where
        S: Future<Output = ()>,
    {
        let result = tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        };
        info!(peers = handler.directory().len(), "Relay stopped");
        result
    }

    async fn send(&self, outbound: Outbound) {
        let Outbound { to, reply } = outbound;
        let bytes = match encode_datagram(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(addr = %to, reply = reply.label(), error = %e, "Failed to encode reply");
                return;
            }
        };
        match self.socket.send_to(&bytes, to).await {
            Ok(_) => debug!(addr = %to, reply = reply.label(), "Datagram sent"),
            Err(e) => error!(addr = %to, reply = reply.label(), error = %e, "Failed to send datagram"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn relay() -> (RelaySocket, SocketAddr) {
        let config = RelayConfig::new("127.0.0.1:0".parse().unwrap());
        let socket = RelaySocket::bind(&config).await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        let config = RelayConfig::new("127.0.0.1:0".parse().unwrap()).with_max_peers(0);
        assert!(RelaySocket::bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn malformed_datagram_does_not_stop_the_loop() {
        let (relay, relay_addr) = relay().await;
        let mut handler = RelayHandler::new(&RelayConfig::default());
        let task = tokio::spawn(async move {
            let _ = tokio::time::timeout(Duration::from_secs(2), relay.run(&mut handler)).await;
        });

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(&[0xff, 0xfe], relay_addr).await.unwrap();
        peer.send_to(b"bogus", relay_addr).await.unwrap();
        peer.send_to(b"connection_request", relay_addr).await.unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"connection_granted");
        task.abort();
    }

    #[tokio::test]
    async fn run_until_shutdown_returns() {
        let (relay, _) = relay().await;
        let mut handler = RelayHandler::new(&RelayConfig::default());
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            relay.run_until_shutdown(&mut handler, async {}),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
