//! Peer connection pool for P2P blockchain network clients.
//!
//! The pool discovers peers through DNS seeds, static peer lists,
//! overlay exchange and custom hooks, drives handshakes over an
//! embedder-supplied wire protocol, and maintains a target number of
//! ready connections with automatic refill and optional hard-limit
//! eviction.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use peerpool::{NetworkParams, PeerPool, PoolConfig, PoolEvent, WireProtocol};
//!
//! # async fn run(wire: Arc<dyn WireProtocol>) {
//! let params = NetworkParams::new("mainnet", 0xd9b4bef9, 8333)
//!     .with_dns_seeds(vec!["seed.example.com".to_string()]);
//! let pool = PeerPool::new(params, PoolConfig::default(), wire).unwrap();
//!
//! let mut events = pool.events().unwrap();
//! pool.connect();
//! while let Some(event) = events.recv().await {
//!     if let PoolEvent::Peer(peer) = event {
//!         println!("connected to {}", peer.id());
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod peer;
pub mod util;
pub mod wire;

pub use config::{
    DiscoveryHook, HookFuture, NetworkParams, PoolConfig, TransportKind, WebSeed,
    DEFAULT_ACCEPT_PORT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RETRY_DELAY,
    DEFAULT_TARGET_PEER_COUNT,
};
pub use connection::{AsyncDuplex, Connection};
pub use discovery::overlay::{Overlay, OverlaySink};
pub use discovery::DiscoveryMethod;
pub use error::{PoolError, PoolResult};
pub use manager::{AcceptOptions, PeerPool, PoolEvent};
pub use peer::{ConnectionDirection, Peer, PeerId, PeerState, RemoteInfo};
pub use wire::{ConnReadHalf, ConnWriteHalf, GetTip, HandshakeContext, Tip, WireProtocol};
