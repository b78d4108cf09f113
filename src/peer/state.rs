//! Peer connection state machine.

use std::fmt;

/// State of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    /// Raw connection obtained, task not yet handshaking.
    #[default]
    Connecting,
    /// Handshake in progress.
    Handshaking,
    /// Handshake complete; the peer is eligible for admission.
    Ready,
    /// Connection closed; terminal.
    Disconnected,
}

impl PeerState {
    /// Check if the handshake has completed.
    pub fn is_ready(&self) -> bool {
        matches!(self, PeerState::Ready)
    }

    /// Check if the connection has terminated.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Disconnected)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::Connecting => write!(f, "connecting"),
            PeerState::Handshaking => write!(f, "handshaking"),
            PeerState::Ready => write!(f, "ready"),
            PeerState::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checks() {
        assert!(!PeerState::Connecting.is_ready());
        assert!(!PeerState::Handshaking.is_ready());
        assert!(PeerState::Ready.is_ready());
        assert!(!PeerState::Disconnected.is_ready());

        assert!(PeerState::Disconnected.is_terminal());
        assert!(!PeerState::Ready.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PeerState::Handshaking.to_string(), "handshaking");
        assert_eq!(PeerState::Ready.to_string(), "ready");
    }
}
