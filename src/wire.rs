//! Wire-protocol boundary.
//!
//! The per-peer handshake and message framing are not implemented here;
//! the embedder supplies a [`WireProtocol`] and the pool drives it with
//! the configured time budgets.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{ReadHalf, WriteHalf};

use crate::connection::Connection;
use crate::error::PoolResult;
use crate::peer::RemoteInfo;

/// Read half of a peer connection.
pub type ConnReadHalf = ReadHalf<Connection>;

/// Write half of a peer connection.
pub type ConnWriteHalf = WriteHalf<Connection>;

/// Best-known chain tip, exchanged during handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    /// Height of the tip block.
    pub height: u64,
    /// Hash of the tip block.
    pub hash: [u8; 32],
}

/// Callback producing the local chain tip at handshake time.
pub type GetTip = Arc<dyn Fn() -> Tip + Send + Sync>;

/// Local side of the handshake.
#[derive(Debug, Clone)]
pub struct HandshakeContext {
    /// Network magic value.
    pub magic: u32,
    /// Local protocol version.
    pub protocol_version: u32,
    /// Local chain tip, if a tip callback was configured.
    pub tip: Option<Tip>,
}

/// Handshake and message framing over a raw connection.
///
/// Implementations own the wire format; the pool only enforces timeouts
/// and routes the results.
#[async_trait]
pub trait WireProtocol: Send + Sync + 'static {
    /// Run the handshake to completion, returning the remote peer's details.
    async fn handshake(
        &self,
        rd: &mut ConnReadHalf,
        wr: &mut ConnWriteHalf,
        ctx: &HandshakeContext,
    ) -> PoolResult<RemoteInfo>;

    /// Read the next framed message.
    ///
    /// A clean remote close must surface as
    /// [`PoolError::PeerDisconnected`](crate::PoolError::PeerDisconnected).
    async fn read_message(&self, rd: &mut ConnReadHalf) -> PoolResult<(String, Bytes)>;

    /// Write one framed message.
    async fn write_message(
        &self,
        wr: &mut ConnWriteHalf,
        command: &str,
        payload: &[u8],
    ) -> PoolResult<()>;
}
