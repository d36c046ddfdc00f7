//! Datagram transport between a peer and the relay.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

use pairchat_protocol::{MAX_DATAGRAM_SIZE, Reply, Request, decode_reply, encode_datagram};

use crate::error::{ClientError, ClientResult};

/// Boxed future returned by the client's I/O traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of waiting for a relay datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Reply(Reply),
    TimedOut,
}

/// Unreliable datagram link to the relay.
///
/// A timeout is a normal outcome, not an error: callers decide whether to
/// retry, give up or keep waiting.
pub trait Transport: Send {
    /// Sends one request to the relay.
    fn send<'a>(&'a mut self, request: &'a Request) -> BoxFuture<'a, ClientResult<()>>;

    /// Waits up to `timeout` for the next well-formed reply.
    fn receive(&mut self, timeout: Duration) -> BoxFuture<'_, ClientResult<Received>>;
}

/// [`Transport`] over a UDP socket connected to the relay.
pub struct UdpTransport {
    socket: UdpSocket,
    relay: SocketAddr,
}

impl UdpTransport {
    /// Resolves `relay` and binds an ephemeral local socket connected to it.
    pub async fn connect(relay: &str) -> ClientResult<Self> {
        let relay_addr = tokio::net::lookup_host(relay)
            .await
            .map_err(|e| ClientError::Connection(format!("failed to resolve {}: {}", relay, e)))?
            .next()
            .ok_or_else(|| ClientError::Connection(format!("no address for {}", relay)))?;

        let local: SocketAddr = if relay_addr.is_ipv6() {
            "[::]:0".parse().map_err(|_| ClientError::Connection("bad local address".into()))?
        } else {
            "0.0.0.0:0".parse().map_err(|_| ClientError::Connection("bad local address".into()))?
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(relay_addr).await?;
        debug!(relay = %relay_addr, local = %socket.local_addr()?, "UDP transport ready");

        Ok(Self {
            socket,
            relay: relay_addr,
        })
    }

    /// Returns the relay address.
    pub fn relay(&self) -> SocketAddr {
        self.relay
    }
}

impl Transport for UdpTransport {
    fn send<'a>(&'a mut self, request: &'a Request) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            let bytes = encode_datagram(request)?;
            self.socket.send(&bytes).await?;
            debug!(command = request.command(), "Request sent");
            Ok(())
        })
    }

    fn receive(&mut self, timeout: Duration) -> BoxFuture<'_, ClientResult<Received>> {
        Box::pin(async move {
            let deadline = Instant::now() + timeout;
            let mut buf = [0u8; MAX_DATAGRAM_SIZE + 1];
            loop {
                let len = match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Err(_) => return Ok(Received::TimedOut),
                    Ok(Ok(len)) => len,
                    // ICMP port unreachable surfaces here while the relay is down.
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                        debug!(error = %e, "Relay unreachable");
                        tokio::time::sleep_until(deadline).await;
                        return Ok(Received::TimedOut);
                    }
                    Ok(Err(e)) => return Err(e.into()),
                };

                match decode_reply(&buf[..len]) {
                    Ok(reply) => {
                        debug!(reply = reply.label(), "Reply received");
                        return Ok(Received::Reply(reply));
                    }
                    Err(e) => warn!(error = %e, "Malformed reply dropped"),
                }
            }
        })
    }
}
