//! Static peer list dialing.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::DIAL_TIMEOUT;
use crate::connection::Connection;
use crate::error::{PoolError, PoolResult};
use crate::util::{parse_addr, pick};

/// Pick one static peer entry and dial it.
///
/// Entries may carry a port or rely on the network default. Hostnames
/// resolve through the OS, not the DNS-seed path.
pub async fn dial_static(
    static_peers: &[String],
    default_port: u16,
) -> PoolResult<(Option<SocketAddr>, Connection)> {
    let entry = pick(static_peers).ok_or_else(|| {
        PoolError::Discovery("no static peers configured".to_string())
    })?;
    let (host, port) = parse_addr(entry, default_port)?;

    tracing::debug!(%host, port, "Dialing static peer");
    let stream = timeout(DIAL_TIMEOUT, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| PoolError::DialTimeout(DIAL_TIMEOUT))??;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(%host, port, error = %e, "Failed to set TCP_NODELAY");
    }

    let addr = stream.peer_addr().ok();
    Ok((addr, Box::new(stream)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_empty_static_list() {
        let err = dial_static(&[], 8333).await.unwrap_err();
        assert!(matches!(err, PoolError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_dial_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let peers = vec![local.to_string()];
        let (addr, _conn) = dial_static(&peers, 1).await.unwrap();
        assert_eq!(addr, Some(local));

        let (_socket, _from) = listener.accept().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_port_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let peers = vec!["127.0.0.1".to_string()];
        let (addr, _conn) = dial_static(&peers, local.port()).await.unwrap();
        assert_eq!(addr, Some(local));
    }

    #[tokio::test]
    async fn test_invalid_entry() {
        let peers = vec!["host:notaport".to_string()];
        let err = dial_static(&peers, 8333).await.unwrap_err();
        assert!(matches!(err, PoolError::InvalidAddress(_)));
    }
}
