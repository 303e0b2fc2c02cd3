//! Error types for mount discovery

use thiserror::Error;

/// Errors that can occur during discovery
///
/// A failing enumeration source is skipped for that cycle rather than
/// aborting the whole cycle, so these mostly surface through logging.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate serial ports: {0}")]
    SerialEnumeration(String),

    /// Failed to enumerate network interfaces
    #[error("failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(String),

    /// Failed to bind a per-interface broadcast socket
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: std::net::Ipv4Addr,
        #[source]
        source: std::io::Error,
    },
}
