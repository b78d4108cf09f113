//! Single connection attempts.
//!
//! One attempt picks one eligible discovery method at random and runs it
//! once under the configured connect timeout. When the budget expires the
//! in-flight dial is dropped; a late success is discarded with it, so an
//! attempt resolves exactly once.

use std::net::SocketAddr;

use tokio::time::timeout;

use crate::config::{NetworkParams, PoolConfig};
use crate::connection::Connection;
use crate::discovery::dns::DnsDialer;
use crate::discovery::overlay::Overlay;
use crate::discovery::static_list::dial_static;
use crate::discovery::{eligible_methods, DiscoveryMethod};
use crate::error::{PoolError, PoolResult};
use crate::util::pick;

pub(crate) enum AttemptOutcome {
    Connected {
        addr: Option<SocketAddr>,
        conn: Connection,
    },
    Failed(PoolError),
    TimedOut,
}

pub(crate) async fn attempt_connection(
    params: &NetworkParams,
    config: &PoolConfig,
    overlay: Option<&dyn Overlay>,
    dns: &DnsDialer,
) -> AttemptOutcome {
    let methods = eligible_methods(
        params,
        config.allow_web_discovery,
        overlay.map(|o| o.peer_count()),
    );
    let Some(method) = pick(&methods).copied() else {
        return AttemptOutcome::Failed(PoolError::NoDiscoveryMethods);
    };

    tracing::debug!(%method, "Attempting connection");
    let dial = dial_method(method, params, overlay, dns);
    let result = match config.connect_timeout {
        Some(budget) => match timeout(budget, dial).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(%method, ?config.connect_timeout, "Connection attempt timed out");
                return AttemptOutcome::TimedOut;
            }
        },
        None => dial.await,
    };

    match result {
        Ok((addr, conn)) => AttemptOutcome::Connected { addr, conn },
        Err(e) => AttemptOutcome::Failed(e),
    }
}

async fn dial_method(
    method: DiscoveryMethod,
    params: &NetworkParams,
    overlay: Option<&dyn Overlay>,
    dns: &DnsDialer,
) -> PoolResult<(Option<SocketAddr>, Connection)> {
    match method {
        DiscoveryMethod::DnsSeed => dns.dial_seed(&params.dns_seeds, params.default_port).await,
        DiscoveryMethod::StaticList => dial_static(&params.static_peers, params.default_port).await,
        DiscoveryMethod::OverlayExchange => {
            let overlay = overlay.ok_or(PoolError::OverlayUnavailable)?;
            let conn = overlay.get_new_peer().await?;
            Ok((None, conn))
        }
        DiscoveryMethod::CustomHook => {
            let hook = params
                .get_new_peer
                .as_ref()
                .ok_or_else(|| PoolError::Discovery("discovery hook not set".to_string()))?;
            let conn = hook().await?;
            Ok((None, conn))
        }
    }
}
