//! Peer connection handles.
//!
//! Each peer runs in its own tokio task: the task drives the handshake
//! under the configured budget, then a read loop plus a writer task. The
//! [`Peer`] handle is a cheap clone shared by the pool, its watchers and
//! the embedder; lifecycle transitions are published on a watch channel.

pub mod info;
pub mod state;

pub use info::{ConnectionDirection, PeerId, RemoteInfo};
pub use state::PeerState;

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::connection::Connection;
use crate::error::{PoolError, PoolResult};
use crate::wire::{GetTip, HandshakeContext, WireProtocol};

/// Options for wrapping a raw connection in a peer.
#[derive(Clone)]
pub struct PeerOptions {
    /// Network magic value.
    pub magic: u32,
    /// Local protocol version.
    pub protocol_version: u32,
    /// Budget for completing the handshake.
    pub handshake_timeout: Duration,
    /// Chain-tip callback for handshake tip exchange.
    pub get_tip: Option<GetTip>,
}

pub(crate) enum PeerCommand {
    Send { command: String, payload: Bytes },
    Disconnect,
}

struct PeerShared {
    id: PeerId,
    addr: Option<SocketAddr>,
    direction: ConnectionDirection,
    state: watch::Receiver<PeerState>,
    command_tx: mpsc::UnboundedSender<PeerCommand>,
    remote: Mutex<Option<RemoteInfo>>,
    last_error: Mutex<Option<PoolError>>,
    messages: Mutex<Option<mpsc::UnboundedReceiver<(String, Bytes)>>>,
}

/// Handle to a live or in-flight peer connection.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerShared>,
}

impl Peer {
    /// Unique identifier of this peer connection.
    pub fn id(&self) -> PeerId {
        self.inner.id
    }

    /// Socket address, when the discovery source knew it.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.inner.addr
    }

    /// Direction of the connection.
    pub fn direction(&self) -> ConnectionDirection {
        self.inner.direction
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PeerState {
        *self.inner.state.borrow()
    }

    /// Check if the handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Remote details learned during the handshake.
    pub fn remote(&self) -> Option<RemoteInfo> {
        self.inner.remote.lock().unwrap().clone()
    }

    /// Take the stream of framed messages received after the handshake.
    ///
    /// Returns `None` after the first call; one consumer owns the stream.
    pub fn take_messages(&self) -> Option<mpsc::UnboundedReceiver<(String, Bytes)>> {
        self.inner.messages.lock().unwrap().take()
    }

    /// Queue one framed message for sending. Fire-and-forget: delivery is
    /// not acknowledged and failures terminate the peer, not the caller.
    pub fn send(&self, command: &str, payload: &[u8]) -> PoolResult<()> {
        self.inner
            .command_tx
            .send(PeerCommand::Send {
                command: command.to_string(),
                payload: Bytes::copy_from_slice(payload),
            })
            .map_err(|_| PoolError::ChannelSend("peer command channel closed".to_string()))
    }

    /// Request a graceful disconnect. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.inner.command_tx.send(PeerCommand::Disconnect);
    }

    /// Wait until the handshake completes, or fail with the terminal error
    /// if the connection closes first.
    pub async fn wait_handshake(&self) -> PoolResult<()> {
        let mut rx = self.inner.state.clone();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                PeerState::Ready => return Ok(()),
                PeerState::Disconnected => return Err(self.terminal_error()),
                PeerState::Connecting | PeerState::Handshaking => {}
            }
            if rx.changed().await.is_err() {
                return Err(self.terminal_error());
            }
        }
    }

    /// Wait for the connection to terminate; returns the error that caused
    /// it, if any (a clean remote close yields `None`).
    pub async fn wait_disconnect(&self) -> Option<PoolError> {
        let mut rx = self.inner.state.clone();
        loop {
            if rx.borrow_and_update().is_terminal() {
                return self.take_error();
            }
            if rx.changed().await.is_err() {
                return self.take_error();
            }
        }
    }

    fn take_error(&self) -> Option<PoolError> {
        self.inner.last_error.lock().unwrap().take()
    }

    fn terminal_error(&self) -> PoolError {
        self.take_error().unwrap_or(PoolError::PeerDisconnected {
            reason: "closed before handshake completed".to_string(),
        })
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.inner.id)
            .field("addr", &self.inner.addr)
            .field("direction", &self.inner.direction)
            .field("state", &self.state())
            .finish()
    }
}

/// Wrap a raw connection in a peer task and return its handle.
pub fn spawn_peer(
    id: PeerId,
    conn: Connection,
    addr: Option<SocketAddr>,
    direction: ConnectionDirection,
    options: PeerOptions,
    wire: Arc<dyn WireProtocol>,
) -> Peer {
    let (state_tx, state_rx) = watch::channel(PeerState::Connecting);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(PeerShared {
        id,
        addr,
        direction,
        state: state_rx,
        command_tx,
        remote: Mutex::new(None),
        last_error: Mutex::new(None),
        messages: Mutex::new(Some(msg_rx)),
    });

    let peer = Peer {
        inner: shared.clone(),
    };

    tokio::spawn(run_peer(
        shared, state_tx, command_rx, msg_tx, conn, options, wire,
    ));

    peer
}

async fn run_peer(
    shared: Arc<PeerShared>,
    state_tx: watch::Sender<PeerState>,
    mut command_rx: mpsc::UnboundedReceiver<PeerCommand>,
    msg_tx: mpsc::UnboundedSender<(String, Bytes)>,
    conn: Connection,
    options: PeerOptions,
    wire: Arc<dyn WireProtocol>,
) {
    let _ = state_tx.send(PeerState::Handshaking);

    let (mut rd, mut wr) = tokio::io::split(conn);
    let ctx = HandshakeContext {
        magic: options.magic,
        protocol_version: options.protocol_version,
        tip: options.get_tip.as_ref().map(|get_tip| get_tip()),
    };

    let remote = match timeout(
        options.handshake_timeout,
        wire.handshake(&mut rd, &mut wr, &ctx),
    )
    .await
    {
        Ok(Ok(remote)) => remote,
        Ok(Err(e)) => {
            tracing::debug!(peer = %shared.id, error = %e, "Handshake failed");
            set_error(&shared, e);
            let _ = state_tx.send(PeerState::Disconnected);
            return;
        }
        Err(_) => {
            tracing::debug!(peer = %shared.id, "Handshake timed out");
            set_error(&shared, PoolError::HandshakeTimeout);
            let _ = state_tx.send(PeerState::Disconnected);
            return;
        }
    };

    tracing::debug!(
        peer = %shared.id,
        version = remote.protocol_version,
        height = remote.best_height,
        "Handshake complete"
    );
    *shared.remote.lock().unwrap() = Some(remote);
    let _ = state_tx.send(PeerState::Ready);

    // Writer runs separately so a blocked read never delays sends.
    let writer_wire = wire.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                PeerCommand::Send { command, payload } => {
                    if let Err(e) = writer_wire.write_message(&mut wr, &command, &payload).await {
                        return Some(e);
                    }
                }
                PeerCommand::Disconnect => return None,
            }
        }
        None
    });

    let error = loop {
        tokio::select! {
            res = wire.read_message(&mut rd) => match res {
                Ok((command, payload)) => {
                    let _ = msg_tx.send((command, payload));
                }
                Err(e) => break terminal_error(e),
            },
            joined = &mut writer => {
                break joined.ok().flatten();
            }
        }
    };

    writer.abort();
    if let Some(e) = error {
        tracing::debug!(peer = %shared.id, error = %e, "Peer connection error");
        set_error(&shared, e);
    }
    let _ = state_tx.send(PeerState::Disconnected);
}

fn set_error(shared: &PeerShared, error: PoolError) {
    *shared.last_error.lock().unwrap() = Some(error);
}

/// A clean remote close terminates the peer without recording an error.
fn terminal_error(e: PoolError) -> Option<PoolError> {
    if e.is_clean_close() {
        None
    } else {
        Some(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{failing_wire, test_options, test_wire, TestWire};

    fn spawn_test_peer(id: u64) -> (Peer, tokio::io::DuplexStream) {
        let (local, remote) = tokio::io::duplex(1024);
        let peer = spawn_peer(
            PeerId::new(id),
            Box::new(local),
            None,
            ConnectionDirection::Outbound,
            test_options(),
            test_wire(),
        );
        (peer, remote)
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let (peer, _remote) = spawn_test_peer(1);
        peer.wait_handshake().await.unwrap();
        assert!(peer.is_ready());
        assert!(peer.remote().is_some());
    }

    #[tokio::test]
    async fn test_handshake_failure() {
        let (local, _remote) = tokio::io::duplex(1024);
        let peer = spawn_peer(
            PeerId::new(2),
            Box::new(local),
            None,
            ConnectionDirection::Outbound,
            test_options(),
            failing_wire(),
        );

        let err = peer.wait_handshake().await.unwrap_err();
        assert!(matches!(err, PoolError::HandshakeFailed(_)));
        assert_eq!(peer.state(), PeerState::Disconnected);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (local, _remote) = tokio::io::duplex(1024);
        let mut options = test_options();
        options.handshake_timeout = Duration::from_millis(20);
        // TestWire handshakes instantly; use a wire that reads first so the
        // handshake blocks on the silent remote end.
        let peer = spawn_peer(
            PeerId::new(3),
            Box::new(local),
            None,
            ConnectionDirection::Outbound,
            options,
            crate::testutil::blocking_wire(),
        );

        let err = peer.wait_handshake().await.unwrap_err();
        assert!(matches!(err, PoolError::HandshakeTimeout));
    }

    #[tokio::test]
    async fn test_disconnect_is_clean() {
        let (peer, _remote) = spawn_test_peer(4);
        peer.wait_handshake().await.unwrap();

        peer.disconnect();
        let err = peer.wait_disconnect().await;
        assert!(err.is_none());
        assert_eq!(peer.state(), PeerState::Disconnected);
    }

    #[tokio::test]
    async fn test_remote_close_terminates_peer() {
        let (peer, remote) = spawn_test_peer(5);
        peer.wait_handshake().await.unwrap();

        drop(remote);
        let err = peer.wait_disconnect().await;
        // EOF is a clean close, not a peer error.
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_send_reaches_remote() {
        let (peer, remote) = spawn_test_peer(6);
        peer.wait_handshake().await.unwrap();

        peer.send("ping", b"abc").unwrap();

        let mut rd = {
            let (rd, _wr) = tokio::io::split(Box::new(remote) as Connection);
            rd
        };
        let (command, payload) = TestWire.read_message(&mut rd).await.unwrap();
        assert_eq!(command, "ping");
        assert_eq!(&payload[..], b"abc");
    }

    #[tokio::test]
    async fn test_incoming_messages() {
        let (peer, remote) = spawn_test_peer(7);
        peer.wait_handshake().await.unwrap();

        let mut messages = peer.take_messages().unwrap();
        assert!(peer.take_messages().is_none());

        let (_rd, mut wr) = tokio::io::split(Box::new(remote) as Connection);
        TestWire.write_message(&mut wr, "inv", b"xyz").await.unwrap();

        let (command, payload) = messages.recv().await.unwrap();
        assert_eq!(command, "inv");
        assert_eq!(&payload[..], b"xyz");
    }
}
