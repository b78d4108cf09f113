//! Overlay transport boundary.
//!
//! Browser-reachable transports (websocket, WebRTC) and the peer-exchange
//! protocol that runs over them live behind the [`Overlay`] trait; the
//! pool only sequences bootstrap, exchange-based fills and inbound
//! acceptance.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::TransportKind;
use crate::connection::Connection;
use crate::error::PoolResult;

/// Channel inbound overlay connections are delivered on.
pub type OverlaySink = mpsc::UnboundedSender<Connection>;

/// Overlay transport supplied by the embedder.
///
/// A transport an implementation does not support must fail with
/// [`PoolError::UnsupportedTransport`](crate::PoolError::UnsupportedTransport);
/// the pool treats that as a soft failure where it can.
#[async_trait]
pub trait Overlay: Send + Sync + 'static {
    /// Dial an overlay seed address directly.
    async fn connect(&self, transport: TransportKind, addr: &str) -> PoolResult<Connection>;

    /// Obtain one connection via peer exchange with current overlay peers.
    async fn get_new_peer(&self) -> PoolResult<Connection>;

    /// Start accepting inbound connections on `port`, delivering them to
    /// `sink`. Idempotent per transport.
    async fn accept(&self, transport: TransportKind, port: u16, sink: OverlaySink)
        -> PoolResult<()>;

    /// Stop accepting inbound connections on `transport`.
    async fn unaccept(&self, transport: TransportKind) -> PoolResult<()>;

    /// Number of overlay peers currently usable for exchange.
    fn peer_count(&self) -> usize;
}
