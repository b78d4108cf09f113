//! Small shared utilities.

use rand::seq::SliceRandom;

use crate::error::{PoolError, PoolResult};

/// Pick one element uniformly at random.
///
/// Single selection primitive shared by discovery-method, DNS-seed,
/// resolved-address and static-peer selection.
pub fn pick<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::thread_rng())
}

/// Parse a `"host:port"`-style address, falling back to `default_port`
/// when no port is given. IPv6 addresses use the bracketed form.
pub fn parse_addr(addr: &str, default_port: u16) -> PoolResult<(String, u16)> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(PoolError::InvalidAddress(addr.to_string()));
    }

    // Bracketed IPv6: "[::1]:8333" or "[::1]"
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| PoolError::InvalidAddress(addr.to_string()))?;
        if host.is_empty() {
            return Err(PoolError::InvalidAddress(addr.to_string()));
        }
        return match tail.strip_prefix(':') {
            Some(port) => {
                let port = port
                    .parse()
                    .map_err(|_| PoolError::InvalidAddress(addr.to_string()))?;
                Ok((host.to_string(), port))
            }
            None if tail.is_empty() => Ok((host.to_string(), default_port)),
            None => Err(PoolError::InvalidAddress(addr.to_string())),
        };
    }

    match addr.rsplit_once(':') {
        // Unbracketed IPv6 has more than one colon; treat it as host only.
        Some((host, _)) if host.contains(':') => Ok((addr.to_string(), default_port)),
        Some((host, port)) => {
            if host.is_empty() {
                return Err(PoolError::InvalidAddress(addr.to_string()));
            }
            let port = port
                .parse()
                .map_err(|_| PoolError::InvalidAddress(addr.to_string()))?;
            Ok((host.to_string(), port))
        }
        None => Ok((addr.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick() {
        let empty: [u32; 0] = [];
        assert!(pick(&empty).is_none());

        let one = [7u32];
        assert_eq!(pick(&one), Some(&7));

        let items = [1u32, 2, 3];
        for _ in 0..20 {
            assert!(items.contains(pick(&items).unwrap()));
        }
    }

    #[test]
    fn test_parse_addr_host_port() {
        assert_eq!(
            parse_addr("seed.example.com:8333", 1).unwrap(),
            ("seed.example.com".to_string(), 8333)
        );
        assert_eq!(
            parse_addr("10.0.0.1:9000", 1).unwrap(),
            ("10.0.0.1".to_string(), 9000)
        );
    }

    #[test]
    fn test_parse_addr_default_port() {
        assert_eq!(
            parse_addr("seed.example.com", 8333).unwrap(),
            ("seed.example.com".to_string(), 8333)
        );
    }

    #[test]
    fn test_parse_addr_ipv6() {
        assert_eq!(
            parse_addr("[::1]:8333", 1).unwrap(),
            ("::1".to_string(), 8333)
        );
        assert_eq!(parse_addr("[::1]", 8333).unwrap(), ("::1".to_string(), 8333));
        assert_eq!(
            parse_addr("2001:db8::1", 8333).unwrap(),
            ("2001:db8::1".to_string(), 8333)
        );
    }

    #[test]
    fn test_parse_addr_invalid() {
        assert!(parse_addr("", 1).is_err());
        assert!(parse_addr(":8333", 1).is_err());
        assert!(parse_addr("host:notaport", 1).is_err());
        assert!(parse_addr("[::1", 1).is_err());
    }
}
