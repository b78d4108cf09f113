//! Peer discovery strategies.
//!
//! Each connection attempt picks one eligible method at random and tries
//! it once; the pool's retry loop provides persistence across failures.

pub mod dns;
pub mod overlay;
pub mod static_list;

use std::fmt;
use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{NetworkParams, DIAL_TIMEOUT};
use crate::connection::Connection;
use crate::error::{PoolError, PoolResult};

/// A way of obtaining one candidate peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// Resolve a DNS seed and dial one returned address.
    DnsSeed,
    /// Dial one entry from the static peer list.
    StaticList,
    /// Ask the overlay transport for a peer learned by exchange.
    OverlayExchange,
    /// Invoke the embedder-supplied discovery hook.
    CustomHook,
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryMethod::DnsSeed => write!(f, "dns-seed"),
            DiscoveryMethod::StaticList => write!(f, "static-list"),
            DiscoveryMethod::OverlayExchange => write!(f, "overlay-exchange"),
            DiscoveryMethod::CustomHook => write!(f, "custom-hook"),
        }
    }
}

/// Determine which discovery methods are currently usable.
///
/// Overlay exchange needs web discovery enabled and at least one overlay
/// peer to ask; `overlay_peers` is `None` when no overlay is attached.
pub(crate) fn eligible_methods(
    params: &NetworkParams,
    allow_web_discovery: bool,
    overlay_peers: Option<usize>,
) -> Vec<DiscoveryMethod> {
    let mut methods = Vec::new();
    if !params.dns_seeds.is_empty() {
        methods.push(DiscoveryMethod::DnsSeed);
    }
    if !params.static_peers.is_empty() {
        methods.push(DiscoveryMethod::StaticList);
    }
    if allow_web_discovery && overlay_peers.map_or(false, |n| n > 0) {
        methods.push(DiscoveryMethod::OverlayExchange);
    }
    if params.get_new_peer.is_some() {
        methods.push(DiscoveryMethod::CustomHook);
    }
    methods
}

/// Dial a TCP peer under the transport-level dial budget.
pub(crate) async fn dial_tcp(addr: SocketAddr) -> PoolResult<Connection> {
    let stream = timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| PoolError::DialTimeout(DIAL_TIMEOUT))??;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(%addr, error = %e, "Failed to set TCP_NODELAY");
    }
    Ok(Box::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::WebSeed;

    fn base_params() -> NetworkParams {
        NetworkParams::new("testnet", 0x0b110907, 18333)
    }

    fn dummy_hook() -> crate::config::DiscoveryHook {
        Arc::new(|| {
            Box::pin(async { Err::<Connection, _>(PoolError::NotConnected) })
        })
    }

    #[test]
    fn test_no_methods_for_bare_params() {
        assert!(eligible_methods(&base_params(), true, None).is_empty());
    }

    #[test]
    fn test_dns_and_static() {
        let params = base_params()
            .with_dns_seeds(vec!["seed.example.com".to_string()])
            .with_static_peers(vec!["10.0.0.1:18333".to_string()]);
        let methods = eligible_methods(&params, true, None);
        assert_eq!(
            methods,
            vec![DiscoveryMethod::DnsSeed, DiscoveryMethod::StaticList]
        );
    }

    #[test]
    fn test_overlay_requires_peers_and_flag() {
        let params = base_params().with_web_seeds(vec![WebSeed::new("ws.example.com:8192")]);

        assert!(eligible_methods(&params, true, Some(0)).is_empty());
        assert!(eligible_methods(&params, false, Some(3)).is_empty());
        assert_eq!(
            eligible_methods(&params, true, Some(3)),
            vec![DiscoveryMethod::OverlayExchange]
        );
    }

    #[test]
    fn test_custom_hook() {
        let params = base_params().with_get_new_peer(dummy_hook());
        assert_eq!(
            eligible_methods(&params, true, None),
            vec![DiscoveryMethod::CustomHook]
        );
    }
}
