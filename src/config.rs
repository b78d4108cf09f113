//! Network parameters and pool configuration.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::{PoolError, PoolResult};
use crate::wire::GetTip;

/// Default target number of pooled peers.
pub const DEFAULT_TARGET_PEER_COUNT: usize = 8;

/// Default budget for a full connection attempt (discovery + dial).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default budget for completing the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default pacing between a failed attempt and its chained replacement.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Fixed socket-level dial budget, independent of the connect timeout.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default port for inbound overlay listeners.
pub const DEFAULT_ACCEPT_PORT: u16 = 8192;

/// Overlay transport kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket transport.
    WebSocket,
    /// WebRTC transport.
    WebRtc,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::WebRtc => write!(f, "webrtc"),
        }
    }
}

/// An overlay seed address, with the transport used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSeed {
    /// Seed address understood by the overlay transport.
    pub addr: String,
    /// Transport to dial the seed with.
    #[serde(default = "WebSeed::default_transport")]
    pub transport: TransportKind,
}

impl WebSeed {
    /// Create a seed dialed over websocket.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            transport: TransportKind::WebSocket,
        }
    }

    /// Create a seed with an explicit transport.
    pub fn with_transport(addr: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            addr: addr.into(),
            transport,
        }
    }

    fn default_transport() -> TransportKind {
        TransportKind::WebSocket
    }
}

/// Future returned by a custom discovery hook.
pub type HookFuture = Pin<Box<dyn Future<Output = PoolResult<Connection>> + Send>>;

/// Caller-supplied discovery function producing raw connections.
pub type DiscoveryHook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Static description of the target network.
///
/// Validated once before the pool is constructed; `id`, `magic` and
/// `default_port` are mandatory.
#[derive(Clone)]
pub struct NetworkParams {
    /// Network identifier (e.g. "mainnet").
    pub id: String,
    /// Network magic value, non-zero.
    pub magic: u32,
    /// Default port peers listen on, non-zero.
    pub default_port: u16,
    /// Protocol version advertised during handshake.
    pub protocol_version: u32,
    /// DNS seed hostnames for peer discovery.
    pub dns_seeds: Vec<String>,
    /// Static peer addresses, `"host:port"` or bare host.
    pub static_peers: Vec<String>,
    /// Overlay seed addresses for bootstrap.
    pub web_seeds: Vec<WebSeed>,
    /// Caller-supplied discovery hook.
    pub get_new_peer: Option<DiscoveryHook>,
}

impl NetworkParams {
    /// Create parameters with the mandatory fields.
    pub fn new(id: impl Into<String>, magic: u32, default_port: u16) -> Self {
        Self {
            id: id.into(),
            magic,
            default_port,
            protocol_version: 1,
            dns_seeds: Vec::new(),
            static_peers: Vec::new(),
            web_seeds: Vec::new(),
            get_new_peer: None,
        }
    }

    /// Set the protocol version.
    pub fn with_protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = version;
        self
    }

    /// Add DNS seed hostnames.
    pub fn with_dns_seeds(mut self, seeds: Vec<String>) -> Self {
        self.dns_seeds = seeds;
        self
    }

    /// Add static peer addresses.
    pub fn with_static_peers(mut self, peers: Vec<String>) -> Self {
        self.static_peers = peers;
        self
    }

    /// Add overlay seed addresses.
    pub fn with_web_seeds(mut self, seeds: Vec<WebSeed>) -> Self {
        self.web_seeds = seeds;
        self
    }

    /// Set a custom discovery hook.
    pub fn with_get_new_peer(mut self, hook: DiscoveryHook) -> Self {
        self.get_new_peer = Some(hook);
        self
    }

    /// Validate the mandatory fields.
    pub fn validate(&self) -> PoolResult<()> {
        if self.id.is_empty() {
            return Err(PoolError::InvalidParams("network id must be set".into()));
        }
        if self.magic == 0 {
            return Err(PoolError::InvalidParams("network magic must be set".into()));
        }
        if self.default_port == 0 {
            return Err(PoolError::InvalidParams("default port must be set".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkParams")
            .field("id", &self.id)
            .field("magic", &self.magic)
            .field("default_port", &self.default_port)
            .field("protocol_version", &self.protocol_version)
            .field("dns_seeds", &self.dns_seeds)
            .field("static_peers", &self.static_peers)
            .field("web_seeds", &self.web_seeds)
            .field("get_new_peer", &self.get_new_peer.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Configuration for the peer pool.
#[derive(Clone)]
pub struct PoolConfig {
    /// Target number of pooled peers.
    pub target_peer_count: usize,
    /// Evict the oldest peer when the pool exceeds the target.
    pub hard_limit: bool,
    /// Budget for one connection attempt; `None` disables the race.
    pub connect_timeout: Option<Duration>,
    /// Budget for completing the handshake.
    pub handshake_timeout: Duration,
    /// Allow overlay-exchange discovery during pool filling.
    pub allow_web_discovery: bool,
    /// Pacing between a failed attempt and its chained replacement.
    pub retry_delay: Duration,
    /// Override for the bootstrap quantum; `None` uses the default policy.
    pub bootstrap_quantum: Option<usize>,
    /// Chain-tip callback handed to each peer for handshake tip exchange.
    pub get_tip: Option<GetTip>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_peer_count: DEFAULT_TARGET_PEER_COUNT,
            hard_limit: false,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            allow_web_discovery: true,
            retry_delay: DEFAULT_RETRY_DELAY,
            bootstrap_quantum: None,
            get_tip: None,
        }
    }
}

impl PoolConfig {
    /// Set the target pool size.
    pub fn with_target_peer_count(mut self, count: usize) -> Self {
        self.target_peer_count = count;
        self
    }

    /// Enable or disable hard-limit eviction.
    pub fn with_hard_limit(mut self, hard_limit: bool) -> Self {
        self.hard_limit = hard_limit;
        self
    }

    /// Set the connection-attempt timeout; `None` disables it.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable or disable overlay-exchange discovery.
    pub fn with_allow_web_discovery(mut self, allow: bool) -> Self {
        self.allow_web_discovery = allow;
        self
    }

    /// Set the retry pacing delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the bootstrap quantum policy.
    pub fn with_bootstrap_quantum(mut self, quantum: usize) -> Self {
        self.bootstrap_quantum = Some(quantum);
        self
    }

    /// Set the chain-tip callback.
    pub fn with_get_tip(mut self, get_tip: GetTip) -> Self {
        self.get_tip = Some(get_tip);
        self
    }

    /// Number of seed admissions to wait for before general pool filling.
    ///
    /// Defaults to `min(seed_count, target_peer_count / 2, 1)`.
    pub fn bootstrap_quantum_for(&self, seed_count: usize) -> usize {
        self.bootstrap_quantum
            .unwrap_or_else(|| seed_count.min(self.target_peer_count / 2).min(1))
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("target_peer_count", &self.target_peer_count)
            .field("hard_limit", &self.hard_limit)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("allow_web_discovery", &self.allow_web_discovery)
            .field("retry_delay", &self.retry_delay)
            .field("bootstrap_quantum", &self.bootstrap_quantum)
            .field("get_tip", &self.get_tip.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.target_peer_count, DEFAULT_TARGET_PEER_COUNT);
        assert!(!config.hard_limit);
        assert_eq!(config.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert!(config.allow_web_discovery);
    }

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::default()
            .with_target_peer_count(4)
            .with_hard_limit(true)
            .with_connect_timeout(None)
            .with_handshake_timeout(Duration::from_secs(1));

        assert_eq!(config.target_peer_count, 4);
        assert!(config.hard_limit);
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.handshake_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_params_validation() {
        assert!(NetworkParams::new("testnet", 0xd9b4bef9, 8333)
            .validate()
            .is_ok());

        assert!(NetworkParams::new("", 0xd9b4bef9, 8333).validate().is_err());
        assert!(NetworkParams::new("testnet", 0, 8333).validate().is_err());
        assert!(NetworkParams::new("testnet", 0xd9b4bef9, 0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_bootstrap_quantum_policy() {
        let config = PoolConfig::default().with_target_peer_count(8);
        // min(seeds, target / 2, 1)
        assert_eq!(config.bootstrap_quantum_for(0), 0);
        assert_eq!(config.bootstrap_quantum_for(3), 1);

        let small = PoolConfig::default().with_target_peer_count(1);
        assert_eq!(small.bootstrap_quantum_for(3), 0);

        let overridden = PoolConfig::default().with_bootstrap_quantum(2);
        assert_eq!(overridden.bootstrap_quantum_for(3), 2);
    }

    #[test]
    fn test_web_seed_default_transport() {
        let seed = WebSeed::new("seed.example.com:8192");
        assert_eq!(seed.transport, TransportKind::WebSocket);

        let rtc = WebSeed::with_transport("seed.example.com:8192", TransportKind::WebRtc);
        assert_eq!(rtc.transport, TransportKind::WebRtc);
    }
}
