//! Raw duplex connection type.
//!
//! Every discovery source (TCP dial, overlay transport, custom hook)
//! normalizes to the same boxed duplex stream, so the attempt orchestrator
//! and the admission pipeline treat all of them interchangeably.

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream usable as a peer connection.
pub trait AsyncDuplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncDuplex for T {}

impl std::fmt::Debug for dyn AsyncDuplex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AsyncDuplex")
    }
}

/// A raw, connected duplex socket from any discovery source.
pub type Connection = Box<dyn AsyncDuplex>;
