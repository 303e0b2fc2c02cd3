//! Mount device identity
//!
//! A [`Device`] identifies one reachable mount interface: either a COM-style
//! serial port (positive index, the OS port number) or a network endpoint
//! discovered via UDP broadcast (negative synthetic index plus the endpoint).
//! The index is the sole identity key and stays stable for as long as the
//! device is tracked by discovery.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::TransportError;

/// Default UDP port mounts listen on for the serial-over-UDP protocol
pub const DEFAULT_REMOTE_PORT: u16 = 11880;

/// A discovered mount interface
///
/// Two devices are equal iff their indices are equal; the endpoint and the
/// discovery timestamp are advisory payload.
#[derive(Debug, Clone, Copy)]
pub struct Device {
    index: i32,
    endpoint: Option<SocketAddr>,
    discovered_at: Instant,
}

impl Device {
    /// Create a device for a COM serial port
    ///
    /// `index` is the OS port number and must be positive.
    pub fn serial(index: i32) -> Result<Self, TransportError> {
        if index <= 0 {
            return Err(TransportError::InvalidIndex(index));
        }
        Ok(Self {
            index,
            endpoint: None,
            discovered_at: Instant::now(),
        })
    }

    /// Create a device for a network endpoint
    ///
    /// `index` is a synthetic id allocated by discovery and must be negative.
    pub fn remote(index: i32, endpoint: SocketAddr) -> Result<Self, TransportError> {
        if index >= 0 {
            return Err(TransportError::InvalidIndex(index));
        }
        Ok(Self {
            index,
            endpoint: Some(endpoint),
            discovered_at: Instant::now(),
        })
    }

    /// Unique index: the COM port number (1 or greater) for serial devices,
    /// a negative synthetic id for network devices
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Endpoint if this is a network device, `None` for serial devices
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    /// When discovery first saw this device
    pub fn discovered_at(&self) -> Instant {
        self.discovered_at
    }

    /// Whether this device is reached over a serial port
    pub fn is_serial(&self) -> bool {
        self.index > 0
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint {
            None => write!(f, "COM{}", self.index),
            Some(ep) if ep.port() == DEFAULT_REMOTE_PORT => write!(f, "{}", ep.ip()),
            Some(ep) => write!(f, "{ep}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_serial_device_requires_positive_index() {
        assert!(Device::serial(3).is_ok());
        assert!(matches!(
            Device::serial(0),
            Err(TransportError::InvalidIndex(0))
        ));
        assert!(matches!(
            Device::serial(-1),
            Err(TransportError::InvalidIndex(-1))
        ));
    }

    #[test]
    fn test_remote_device_requires_negative_index() {
        let ep = endpoint("192.168.4.1:11880");
        assert!(Device::remote(-1, ep).is_ok());
        assert!(Device::remote(0, ep).is_err());
        assert!(Device::remote(5, ep).is_err());
    }

    #[test]
    fn test_display_names() {
        let com = Device::serial(7).unwrap();
        assert_eq!(com.to_string(), "COM7");

        let default_port = Device::remote(-1, endpoint("192.168.4.1:11880")).unwrap();
        assert_eq!(default_port.to_string(), "192.168.4.1");

        let custom_port = Device::remote(-2, endpoint("192.168.4.1:12345")).unwrap();
        assert_eq!(custom_port.to_string(), "192.168.4.1:12345");
    }

    #[test]
    fn test_equality_is_index_only() {
        let a = Device::remote(-1, endpoint("192.168.4.1:11880")).unwrap();
        let b = Device::remote(-1, endpoint("10.0.0.9:11880")).unwrap();
        let c = Device::remote(-2, endpoint("192.168.4.1:11880")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
