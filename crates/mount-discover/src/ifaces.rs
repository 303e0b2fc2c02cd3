//! Network interface enumeration
//!
//! Lists the local IPv4 addresses a discovery probe can be broadcast from.
//! An address qualifies when its interface is up, not loopback, and
//! broadcast-capable (which excludes receive-only and point-to-point links).

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use if_addrs::{get_if_addrs, IfAddr};

use crate::error::DiscoveryError;

/// Enumerate broadcast-capable IPv4 interface addresses
pub(crate) fn broadcast_capable_addrs() -> Result<BTreeSet<Ipv4Addr>, DiscoveryError> {
    let interfaces =
        get_if_addrs().map_err(|e| DiscoveryError::InterfaceEnumeration(e.to_string()))?;

    let mut addrs = BTreeSet::new();
    for interface in interfaces {
        if interface.is_loopback() {
            continue;
        }
        if let IfAddr::V4(v4) = interface.addr {
            if v4.broadcast.is_some() {
                addrs.insert(v4.ip);
            }
        }
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_succeeds() {
        // Contents depend on the host; the call itself must not fail
        let addrs = broadcast_capable_addrs().unwrap();
        assert!(addrs.iter().all(|ip| !ip.is_loopback()));
    }
}
