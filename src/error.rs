//! Pool error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::config::TransportKind;

/// Errors surfaced by the peer pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Network parameters failed validation.
    #[error("invalid network parameters: {0}")]
    InvalidParams(String),

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// DNS resolution failed.
    #[error("DNS resolution failed for {host}: {error}")]
    Dns { host: String, error: String },

    /// No discovery strategy is currently eligible.
    #[error("no discovery methods available to get new peers")]
    NoDiscoveryMethods,

    /// A connection attempt exceeded the configured connect budget.
    #[error("connection timed out")]
    ConnectTimeout,

    /// A raw socket dial exceeded the fixed dial budget.
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Handshake exceeded the configured handshake budget.
    #[error("handshake timeout")]
    HandshakeTimeout,

    /// Peer closed the connection.
    #[error("peer disconnected: {reason}")]
    PeerDisconnected { reason: String },

    /// A peer address string could not be parsed.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Operation requires at least one connected peer.
    #[error("not connected to any peers")]
    NotConnected,

    /// Overlay operation requested but no overlay transport was configured.
    #[error("overlay transport not configured")]
    OverlayUnavailable,

    /// The overlay transport does not support the requested kind.
    #[error("transport does not support {0}")]
    UnsupportedTransport(TransportKind),

    /// Overlay or listener transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// A discovery source failed to produce a connection.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Channel send error.
    #[error("channel send error: {0}")]
    ChannelSend(String),
}

impl PoolError {
    /// True for errors that mean the remote side went away cleanly rather
    /// than a protocol or transport fault.
    pub fn is_clean_close(&self) -> bool {
        match self {
            PoolError::PeerDisconnected { .. } => true,
            PoolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
