//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/pairchat/config.toml` by default:
//!
//! ```toml
//! debug = false
//!
//! [relay]
//! bind = "0.0.0.0:7070"
//! max_peers = 4
//! pending_timeout_secs = 30
//!
//! [peer]
//! relay = "127.0.0.1:7070"
//! name = "alice"
//! receive_timeout_secs = 10
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pairchat_protocol::{DEFAULT_RELAY_PORT, Nickname};
use pairchat_server::{DEFAULT_MAX_PEERS, RelayConfig, default_bind_addr};

use crate::error::{ClientError, ClientResult};

/// Configuration for the pairchat binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Relay settings, used by `pairchat relay`.
    pub relay: RelaySettings,

    /// Peer settings, used by `pairchat chat`.
    pub peer: PeerSettings,
}

/// Relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Address to bind the UDP socket to.
    pub bind: SocketAddr,

    /// Number of peer slots.
    pub max_peers: u16,

    /// Seconds before an unanswered pairing request is dropped.
    pub pending_timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind: default_bind_addr(),
            max_peers: DEFAULT_MAX_PEERS,
            pending_timeout_secs: 30,
        }
    }
}

impl RelaySettings {
    /// Converts to the relay's runtime configuration.
    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig::new(self.bind)
            .with_max_peers(self.max_peers)
            .with_pending_timeout(Duration::from_secs(self.pending_timeout_secs))
    }
}

/// Peer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    /// Relay address (`host:port`).
    pub relay: String,

    /// Display name; prompted for when unset.
    pub name: Option<String>,

    /// Seconds to wait for each relay datagram.
    pub receive_timeout_secs: u64,

    /// Seconds between connection attempts while the relay is full.
    pub retry_delay_secs: u64,

    /// Seconds to answer a pairing offer.
    pub decision_window_secs: u64,

    /// Seconds to wait for a pairing request to be answered.
    pub negotiation_timeout_secs: u64,

    /// Attempts at one acknowledgement cycle before giving up on the partner.
    pub max_send_attempts: u32,
}

impl Default for PeerSettings {
    fn default() -> Self {
        let defaults = PeerConfig::default();
        Self {
            relay: defaults.relay,
            name: None,
            receive_timeout_secs: defaults.receive_timeout.as_secs(),
            retry_delay_secs: defaults.retry_delay.as_secs(),
            decision_window_secs: defaults.decision_window.as_secs(),
            negotiation_timeout_secs: defaults.negotiation_timeout.as_secs(),
            max_send_attempts: defaults.max_send_attempts,
        }
    }
}

impl PeerSettings {
    /// Converts to the peer engine's runtime configuration.
    pub fn to_peer_config(&self) -> PeerConfig {
        PeerConfig {
            relay: self.relay.clone(),
            name: self.name.clone(),
            receive_timeout: Duration::from_secs(self.receive_timeout_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            decision_window: Duration::from_secs(self.decision_window_secs),
            negotiation_timeout: Duration::from_secs(self.negotiation_timeout_secs),
            max_send_attempts: self.max_send_attempts,
        }
    }
}

/// Runtime configuration of the peer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Relay address (`host:port`).
    pub relay: String,
    /// Display name; prompted for when unset.
    pub name: Option<String>,
    pub receive_timeout: Duration,
    pub retry_delay: Duration,
    pub decision_window: Duration,
    pub negotiation_timeout: Duration,
    pub max_send_attempts: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay: format!("127.0.0.1:{}", DEFAULT_RELAY_PORT),
            name: None,
            receive_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(10),
            decision_window: Duration::from_secs(10),
            negotiation_timeout: Duration::from_secs(20),
            max_send_attempts: 6,
        }
    }
}

impl PeerConfig {
    /// Builder: set relay address.
    pub fn with_relay(mut self, relay: impl Into<String>) -> Self {
        self.relay = relay.into();
        self
    }

    /// Builder: set display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Builder: set max send attempts.
    pub fn with_max_send_attempts(mut self, attempts: u32) -> Self {
        self.max_send_attempts = attempts;
        self
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pairchat")
    }

    /// Checks every setting that would make the relay or peer misbehave.
    pub fn validate(&self) -> ClientResult<()> {
        self.relay
            .to_relay_config()
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let peer = &self.peer;
        if peer.relay.trim().is_empty() {
            return Err(ClientError::Config("peer.relay must not be empty".into()));
        }
        if let Some(ref name) = peer.name {
            Nickname::parse(name).map_err(|e| ClientError::Config(format!("peer.name: {}", e)))?;
        }
        for (key, secs) in [
            ("peer.receive_timeout_secs", peer.receive_timeout_secs),
            ("peer.decision_window_secs", peer.decision_window_secs),
            ("peer.negotiation_timeout_secs", peer.negotiation_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ClientError::Config(format!("{} must be positive", key)));
            }
        }
        if peer.max_send_attempts == 0 {
            return Err(ClientError::Config(
                "peer.max_send_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
