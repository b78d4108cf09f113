//! DNS seed resolution.

use std::net::SocketAddr;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::connection::Connection;
use crate::error::{PoolError, PoolResult};
use crate::util::pick;

/// Resolves DNS seeds and dials one of the returned addresses.
pub struct DnsDialer {
    resolver: TokioAsyncResolver,
}

impl DnsDialer {
    /// Create a dialer using the system default resolver configuration.
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Pick one seed, resolve it, and dial one resolved address on `port`.
    pub async fn dial_seed(
        &self,
        seeds: &[String],
        port: u16,
    ) -> PoolResult<(Option<SocketAddr>, Connection)> {
        let seed = pick(seeds).ok_or_else(|| {
            PoolError::Discovery("no DNS seeds configured".to_string())
        })?;

        tracing::debug!(%seed, "Resolving DNS seed");
        let lookup = self
            .resolver
            .lookup_ip(seed.as_str())
            .await
            .map_err(|e| PoolError::Dns {
                host: seed.clone(),
                error: e.to_string(),
            })?;

        let ips: Vec<_> = lookup.iter().collect();
        let ip = pick(&ips).copied().ok_or_else(|| PoolError::Dns {
            host: seed.clone(),
            error: "seed resolved to no addresses".to_string(),
        })?;

        let addr = SocketAddr::new(ip, port);
        tracing::debug!(%seed, %addr, "Dialing resolved peer");
        let conn = super::dial_tcp(addr).await?;
        Ok((Some(addr), conn))
    }
}

impl Default for DnsDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_seed_list() {
        let dialer = DnsDialer::new();
        let err = dialer.dial_seed(&[], 8333).await.unwrap_err();
        assert!(matches!(err, PoolError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_unresolvable_seed() {
        let dialer = DnsDialer::new();
        let seeds = vec!["nonexistent.invalid".to_string()];
        let err = dialer.dial_seed(&seeds, 8333).await.unwrap_err();
        assert!(matches!(err, PoolError::Dns { .. }));
    }
}
