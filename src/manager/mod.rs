//! Peer pool orchestration.
//!
//! The pool owns the roster of ready peers and keeps it at the target
//! size: seed bootstrap on `connect`, chained attempts on failure, refill
//! on disconnect, and FIFO eviction when the hard limit is on.

mod attempt;
mod roster;

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{NetworkParams, PoolConfig, TransportKind, DEFAULT_ACCEPT_PORT};
use crate::connection::Connection;
use crate::discovery::dns::DnsDialer;
use crate::discovery::overlay::Overlay;
use crate::error::{PoolError, PoolResult};
use crate::peer::{ConnectionDirection, Peer, PeerId, PeerOptions};
use crate::wire::WireProtocol;

use attempt::{attempt_connection, AttemptOutcome};
use roster::PeerRoster;

/// Events emitted by the pool.
#[derive(Debug)]
pub enum PoolEvent {
    /// A peer completed its handshake and joined the pool.
    Peer(Peer),
    /// A pooled peer disconnected.
    Disconnect(Peer),
    /// A connection attempt failed before admission. `peer` is set when
    /// the failure happened after the raw connection was obtained.
    ConnectError {
        error: PoolError,
        peer: Option<Peer>,
    },
    /// A pooled peer terminated with an error.
    PeerError { peer: Peer, error: PoolError },
    /// A pool-level error outside any single attempt.
    Error(PoolError),
}

/// Options for accepting inbound overlay connections.
#[derive(Debug, Clone)]
pub struct AcceptOptions {
    /// Port the overlay listeners bind.
    pub port: u16,
    /// Also listen over WebRTC when the transport supports it.
    pub webrtc: bool,
}

impl Default for AcceptOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_ACCEPT_PORT,
            webrtc: true,
        }
    }
}

struct BootstrapGate {
    /// Seed admissions still required before general filling starts.
    remaining: usize,
    /// Seed dials not yet settled either way.
    outstanding: usize,
}

struct PoolInner {
    params: NetworkParams,
    config: PoolConfig,
    wire: Arc<dyn WireProtocol>,
    overlay: Option<Arc<dyn Overlay>>,
    dns: DnsDialer,
    roster: Mutex<PeerRoster>,
    connecting: AtomicBool,
    accepting: AtomicBool,
    bootstrap: Mutex<Option<BootstrapGate>>,
    next_peer_id: AtomicU64,
    event_tx: mpsc::UnboundedSender<PoolEvent>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PoolEvent>>>,
}

/// Handle to a peer pool. Cheap to clone.
#[derive(Clone)]
pub struct PeerPool {
    inner: Arc<PoolInner>,
}

impl PeerPool {
    /// Create a pool without an overlay transport.
    pub fn new(
        params: NetworkParams,
        config: PoolConfig,
        wire: Arc<dyn WireProtocol>,
    ) -> PoolResult<Self> {
        Self::build(params, config, wire, None)
    }

    /// Create a pool with an overlay transport for web seeds, exchange
    /// discovery and inbound acceptance.
    pub fn with_overlay(
        params: NetworkParams,
        config: PoolConfig,
        wire: Arc<dyn WireProtocol>,
        overlay: Arc<dyn Overlay>,
    ) -> PoolResult<Self> {
        Self::build(params, config, wire, Some(overlay))
    }

    fn build(
        params: NetworkParams,
        config: PoolConfig,
        wire: Arc<dyn WireProtocol>,
        overlay: Option<Arc<dyn Overlay>>,
    ) -> PoolResult<Self> {
        params.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            inner: Arc::new(PoolInner {
                params,
                config,
                wire,
                overlay,
                dns: DnsDialer::new(),
                roster: Mutex::new(PeerRoster::default()),
                connecting: AtomicBool::new(false),
                accepting: AtomicBool::new(false),
                bootstrap: Mutex::new(None),
                next_peer_id: AtomicU64::new(0),
                event_tx,
                events: Mutex::new(Some(event_rx)),
            }),
        })
    }

    /// Take the pool event stream. Returns `None` after the first call.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<PoolEvent>> {
        self.inner.events.lock().unwrap().take()
    }

    /// Whether the pool is maintaining connections.
    pub fn is_connecting(&self) -> bool {
        self.inner.connecting.load(Ordering::SeqCst)
    }

    /// Number of peers currently in the pool.
    pub fn peer_count(&self) -> usize {
        self.inner.roster.lock().unwrap().len()
    }

    /// Snapshot of the current roster, oldest first.
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.roster.lock().unwrap().snapshot()
    }

    /// Start maintaining the pool at the target size.
    ///
    /// When web seeds are configured, a small quantum of seed admissions
    /// is awaited before general filling begins so exchange discovery has
    /// overlay peers to ask. Idempotent while already connecting.
    pub fn connect(&self) {
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            network = %self.inner.params.id,
            target = self.inner.config.target_peer_count,
            "Starting peer pool"
        );

        let seeds = self.inner.params.web_seeds.clone();
        let quantum = self.inner.config.bootstrap_quantum_for(seeds.len());

        if seeds.is_empty() || !self.inner.config.allow_web_discovery {
            self.inner.fill_peers();
            return;
        }
        let Some(overlay) = self.inner.overlay.clone() else {
            tracing::warn!("Web seeds configured but no overlay transport; skipping bootstrap");
            self.inner.emit(PoolEvent::Error(PoolError::OverlayUnavailable));
            self.inner.fill_peers();
            return;
        };

        if quantum > 0 {
            *self.inner.bootstrap.lock().unwrap() = Some(BootstrapGate {
                remaining: quantum,
                outstanding: seeds.len(),
            });
        }

        for seed in seeds {
            let inner = self.inner.clone();
            let overlay = overlay.clone();
            tokio::spawn(async move {
                match overlay.connect(seed.transport, &seed.addr).await {
                    Ok(conn) => {
                        inner
                            .admit_seed_connection(conn, ConnectionDirection::Outbound)
                            .await;
                    }
                    Err(e) => {
                        tracing::debug!(seed = %seed.addr, error = %e, "Seed dial failed");
                        inner.emit(PoolEvent::ConnectError {
                            error: e,
                            peer: None,
                        });
                    }
                }
                inner.seed_settled();
            });
        }

        if quantum == 0 {
            self.inner.fill_peers();
        }
    }

    /// Stop maintaining the pool and disconnect every peer.
    pub fn disconnect(&self) {
        self.inner.connecting.store(false, Ordering::SeqCst);
        *self.inner.bootstrap.lock().unwrap() = None;

        let peers = self.inner.roster.lock().unwrap().drain();
        tracing::info!(count = peers.len(), "Stopping peer pool");
        for peer in peers {
            peer.disconnect();
        }
    }

    /// Admit a raw connection as an inbound peer, driving the handshake
    /// with the pool's wire protocol.
    pub fn add_connection(&self, conn: Connection) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner
                .admit_connection(None, conn, ConnectionDirection::Inbound)
                .await;
        });
    }

    /// Admit an externally created peer. If its handshake has not finished
    /// yet, admission is deferred until it does; a peer that dies before
    /// becoming ready is dropped silently.
    pub fn add_peer(&self, peer: Peer) {
        if peer.is_ready() {
            self.inner.add_ready_peer(peer);
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match peer.wait_handshake().await {
                Ok(()) => inner.add_ready_peer(peer),
                Err(e) => {
                    tracing::debug!(peer = %peer.id(), error = %e, "Added peer died before ready");
                }
            }
        });
    }

    /// Pick one pooled peer uniformly at random.
    pub fn random_peer(&self) -> PoolResult<Peer> {
        self.inner
            .roster
            .lock()
            .unwrap()
            .random()
            .ok_or(PoolError::NotConnected)
    }

    /// Broadcast one framed message to every pooled peer.
    pub fn send(&self, command: &str, payload: &[u8]) -> PoolResult<()> {
        let peers = self.inner.roster.lock().unwrap().snapshot();
        if peers.is_empty() {
            return Err(PoolError::NotConnected);
        }
        for peer in peers {
            if let Err(e) = peer.send(command, payload) {
                tracing::debug!(peer = %peer.id(), error = %e, "Broadcast send failed");
            }
        }
        Ok(())
    }

    /// Hand one randomly selected peer to a streaming consumer.
    pub fn with_random_peer<T>(&self, f: impl FnOnce(Peer) -> T) -> PoolResult<T> {
        Ok(f(self.random_peer()?))
    }

    /// Hand the current roster snapshot to a consumer.
    pub fn with_peers<T>(&self, f: impl FnOnce(Vec<Peer>) -> T) -> PoolResult<T> {
        let peers = self.peers();
        if peers.is_empty() {
            return Err(PoolError::NotConnected);
        }
        Ok(f(peers))
    }

    /// Start accepting inbound overlay connections.
    ///
    /// Websocket listening is mandatory; WebRTC is attempted when enabled
    /// and skipped if the transport does not support it.
    pub async fn accept(&self, options: AcceptOptions) -> PoolResult<()> {
        let overlay = self
            .inner
            .overlay
            .clone()
            .ok_or(PoolError::OverlayUnavailable)?;
        if self.inner.accepting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (sink, mut inbound) = mpsc::unbounded_channel();
        if let Err(e) = overlay
            .accept(TransportKind::WebSocket, options.port, sink.clone())
            .await
        {
            self.inner.accepting.store(false, Ordering::SeqCst);
            return Err(e);
        }
        if options.webrtc {
            match overlay
                .accept(TransportKind::WebRtc, options.port, sink)
                .await
            {
                Ok(()) => {}
                Err(PoolError::UnsupportedTransport(kind)) => {
                    tracing::debug!(transport = %kind, "Transport not supported for accept");
                }
                Err(e) => {
                    self.inner.accepting.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        tracing::info!(port = options.port, "Accepting inbound connections");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(conn) = inbound.recv().await {
                let inner = inner.clone();
                tokio::spawn(async move {
                    inner
                        .admit_connection(None, conn, ConnectionDirection::Inbound)
                        .await;
                });
            }
        });
        Ok(())
    }

    /// Stop accepting inbound overlay connections on all transports.
    pub async fn unaccept(&self) -> PoolResult<()> {
        let overlay = self
            .inner
            .overlay
            .clone()
            .ok_or(PoolError::OverlayUnavailable)?;
        self.inner.accepting.store(false, Ordering::SeqCst);

        let mut failures = Vec::new();
        for kind in [TransportKind::WebSocket, TransportKind::WebRtc] {
            match overlay.unaccept(kind).await {
                Ok(()) | Err(PoolError::UnsupportedTransport(_)) => {}
                Err(e) => failures.push(format!("{kind}: {e}")),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Transport(failures.join("; ")))
        }
    }
}

impl fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPool")
            .field("network", &self.inner.params.id)
            .field("peers", &self.peer_count())
            .field("connecting", &self.is_connecting())
            .finish()
    }
}

impl PoolInner {
    fn emit(&self, event: PoolEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Spawn one attempt per missing peer.
    fn fill_peers(self: &Arc<Self>) {
        let deficit = self
            .config
            .target_peer_count
            .saturating_sub(self.roster.lock().unwrap().len());
        tracing::debug!(deficit, "Filling peer pool");
        for _ in 0..deficit {
            self.spawn_attempt(Duration::ZERO);
        }
    }

    fn spawn_attempt(self: &Arc<Self>, delay: Duration) {
        let inner = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            inner.run_attempt().await;
        });
    }

    async fn run_attempt(self: &Arc<Self>) {
        if !self.connecting.load(Ordering::SeqCst) {
            return;
        }
        if self.roster.lock().unwrap().len() >= self.config.target_peer_count {
            return;
        }

        let overlay = self.overlay.as_deref();
        match attempt_connection(&self.params, &self.config, overlay, &self.dns).await {
            AttemptOutcome::Connected { addr, conn } => {
                self.admit_connection(addr, conn, ConnectionDirection::Outbound)
                    .await;
            }
            AttemptOutcome::Failed(error) => {
                self.emit(PoolEvent::ConnectError { error, peer: None });
                self.chain_retry();
            }
            AttemptOutcome::TimedOut => {
                self.emit(PoolEvent::ConnectError {
                    error: PoolError::ConnectTimeout,
                    peer: None,
                });
                self.chain_retry();
            }
        }
    }

    /// A failed attempt chains its replacement, paced by the retry delay
    /// so an all-failing network does not spin.
    fn chain_retry(self: &Arc<Self>) {
        if self.connecting.load(Ordering::SeqCst) {
            self.spawn_attempt(self.config.retry_delay);
        }
    }

    /// Wrap a raw connection in a peer, drive its handshake, and admit it.
    async fn admit_connection(
        self: &Arc<Self>,
        addr: Option<SocketAddr>,
        conn: Connection,
        direction: ConnectionDirection,
    ) {
        self.admit(addr, conn, direction, false).await;
    }

    /// Admission for web-seed dials; only these count against the
    /// bootstrap quantum.
    async fn admit_seed_connection(self: &Arc<Self>, conn: Connection, direction: ConnectionDirection) {
        self.admit(None, conn, direction, true).await;
    }

    async fn admit(
        self: &Arc<Self>,
        addr: Option<SocketAddr>,
        conn: Connection,
        direction: ConnectionDirection,
        from_seed: bool,
    ) {
        let id = PeerId::new(self.next_peer_id.fetch_add(1, Ordering::SeqCst));
        let options = PeerOptions {
            magic: self.params.magic,
            protocol_version: self.params.protocol_version,
            handshake_timeout: self.config.handshake_timeout,
            get_tip: self.config.get_tip.clone(),
        };
        let peer = crate::peer::spawn_peer(id, conn, addr, direction, options, self.wire.clone());

        match peer.wait_handshake().await {
            Ok(()) => self.admit_ready_peer(peer, from_seed),
            Err(error) => {
                tracing::debug!(peer = %id, error = %error, "Handshake rejected peer");
                self.emit(PoolEvent::ConnectError {
                    error,
                    peer: Some(peer),
                });
                self.chain_retry();
            }
        }
    }

    fn add_ready_peer(self: &Arc<Self>, peer: Peer) {
        self.admit_ready_peer(peer, false);
    }

    fn admit_ready_peer(self: &Arc<Self>, peer: Peer, from_seed: bool) {
        let (count, evicted) = {
            let mut roster = self.roster.lock().unwrap();
            if !roster.push(peer.clone()) {
                tracing::debug!(peer = %peer.id(), "Peer already pooled");
                return;
            }
            let evicted = if self.config.hard_limit && roster.len() > self.config.target_peer_count
            {
                roster.evict_oldest()
            } else {
                None
            };
            (roster.len(), evicted)
        };
        if let Some(old) = evicted {
            tracing::debug!(peer = %old.id(), "Evicting oldest peer over hard limit");
            old.disconnect();
        }

        tracing::info!(
            peer = %peer.id(),
            addr = ?peer.addr(),
            direction = %peer.direction(),
            count,
            "Peer connected"
        );

        if from_seed {
            self.notify_seed_admitted();
        }
        self.spawn_watcher(peer.clone());
        self.emit(PoolEvent::Peer(peer));
    }

    /// Count a seed admission against the bootstrap gate; the gate opening
    /// triggers general pool filling. Manual and inbound admissions do not
    /// reach here.
    fn notify_seed_admitted(self: &Arc<Self>) {
        let opened = {
            let mut gate = self.bootstrap.lock().unwrap();
            match gate.as_mut() {
                Some(g) => {
                    g.remaining = g.remaining.saturating_sub(1);
                    if g.remaining == 0 {
                        *gate = None;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if opened {
            tracing::debug!("Bootstrap quantum reached");
            self.fill_peers();
        }
    }

    /// A seed dial settled without necessarily admitting a peer. When
    /// every seed has settled and the gate never opened, proceed to fill
    /// anyway rather than stalling the pool.
    fn seed_settled(self: &Arc<Self>) {
        let exhausted = {
            let mut gate = self.bootstrap.lock().unwrap();
            match gate.as_mut() {
                Some(g) => {
                    g.outstanding = g.outstanding.saturating_sub(1);
                    if g.outstanding == 0 {
                        *gate = None;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if exhausted {
            tracing::debug!("All seed dials settled before quantum; filling anyway");
            self.fill_peers();
        }
    }

    fn spawn_watcher(self: &Arc<Self>, peer: Peer) {
        let inner = self.clone();
        tokio::spawn(async move {
            let error = peer.wait_disconnect().await;
            let (was_present, count) = {
                let mut roster = inner.roster.lock().unwrap();
                (roster.remove(peer.id()).is_some(), roster.len())
            };

            if let Some(error) = error {
                tracing::warn!(peer = %peer.id(), %error, "Peer failed");
                inner.emit(PoolEvent::PeerError {
                    peer: peer.clone(),
                    error,
                });
            }
            tracing::info!(peer = %peer.id(), count, "Peer disconnected");

            // Refill only for peers the watcher itself removed; eviction
            // and pool shutdown have already taken them out.
            if was_present
                && inner.connecting.load(Ordering::SeqCst)
                && count < inner.config.target_peer_count
            {
                inner.spawn_attempt(Duration::ZERO);
            }
            inner.emit(PoolEvent::Disconnect(peer));
        });
    }
}
