//! Pool membership, in admission order.

use crate::peer::{Peer, PeerId};
use crate::util::pick;

/// Ordered set of admitted peers. Oldest admission first, which makes
/// hard-limit eviction a pop from the front.
#[derive(Default)]
pub(crate) struct PeerRoster {
    peers: Vec<Peer>,
}

impl PeerRoster {
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.iter().any(|p| p.id() == id)
    }

    /// Admit a peer. Returns `false` without modifying the roster when a
    /// peer with the same id is already present.
    pub fn push(&mut self, peer: Peer) -> bool {
        if self.contains(peer.id()) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        let idx = self.peers.iter().position(|p| p.id() == id)?;
        Some(self.peers.remove(idx))
    }

    /// Remove and return the oldest admitted peer.
    pub fn evict_oldest(&mut self) -> Option<Peer> {
        if self.peers.is_empty() {
            None
        } else {
            Some(self.peers.remove(0))
        }
    }

    pub fn random(&self) -> Option<Peer> {
        pick(&self.peers).cloned()
    }

    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.clone()
    }

    pub fn drain(&mut self) -> Vec<Peer> {
        std::mem::take(&mut self.peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::spawn_ready_peer;

    #[tokio::test]
    async fn test_push_and_dup_guard() {
        let mut roster = PeerRoster::default();
        let (a, _ha) = spawn_ready_peer(1).await;

        assert!(roster.push(a.clone()));
        assert!(!roster.push(a));
        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_order_is_fifo() {
        let mut roster = PeerRoster::default();
        let (a, _ha) = spawn_ready_peer(1).await;
        let (b, _hb) = spawn_ready_peer(2).await;
        let (c, _hc) = spawn_ready_peer(3).await;
        roster.push(a);
        roster.push(b);
        roster.push(c);

        assert_eq!(roster.evict_oldest().unwrap().id(), PeerId::new(1));
        assert_eq!(roster.evict_oldest().unwrap().id(), PeerId::new(2));
        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let mut roster = PeerRoster::default();
        let (a, _ha) = spawn_ready_peer(1).await;
        let (b, _hb) = spawn_ready_peer(2).await;
        roster.push(a);
        roster.push(b);

        assert!(roster.remove(PeerId::new(1)).is_some());
        assert!(roster.remove(PeerId::new(1)).is_none());
        assert!(!roster.contains(PeerId::new(1)));
        assert!(roster.contains(PeerId::new(2)));
    }

    #[tokio::test]
    async fn test_drain_empties() {
        let mut roster = PeerRoster::default();
        let (a, _ha) = spawn_ready_peer(1).await;
        roster.push(a);

        assert_eq!(roster.drain().len(), 1);
        assert!(roster.is_empty());
        assert!(roster.random().is_none());
    }
}
