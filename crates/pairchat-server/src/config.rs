//! Relay configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use pairchat_protocol::DEFAULT_RELAY_PORT;

use crate::error::{ServerError, ServerResult};

/// Default number of simultaneously registered peers.
pub const DEFAULT_MAX_PEERS: u16 = 4;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the UDP socket binds to.
    pub bind: SocketAddr,

    /// Size of the slot pool.
    pub max_peers: u16,

    /// Age after which an unanswered pairing request is dropped.
    pub pending_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_addr(),
            max_peers: DEFAULT_MAX_PEERS,
            pending_timeout: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    /// Creates a new relay configuration bound to the given address.
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Default::default()
        }
    }

    /// Builder: set slot pool size.
    pub fn with_max_peers(mut self, max: u16) -> Self {
        self.max_peers = max;
        self
    }

    /// Builder: set pending request timeout.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// Checks that the configuration can run a relay.
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_peers == 0 {
            return Err(ServerError::config("max_peers must be at least 1"));
        }
        if self.pending_timeout.is_zero() {
            return Err(ServerError::config("pending_timeout must be positive"));
        }
        Ok(())
    }
}

/// Returns the default bind address, `0.0.0.0:7070`.
pub fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_RELAY_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.bind.to_string(), "0.0.0.0:7070");
        assert_eq!(config.max_peers, 4);
        assert_eq!(config.pending_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = RelayConfig::new("127.0.0.1:9000".parse().unwrap())
            .with_max_peers(8)
            .with_pending_timeout(Duration::from_secs(5));

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.max_peers, 8);
        assert_eq!(config.pending_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_peers_is_invalid() {
        let config = RelayConfig::default().with_max_peers(0);
        assert!(matches!(config.validate(), Err(ServerError::Config { .. })));
    }
}
