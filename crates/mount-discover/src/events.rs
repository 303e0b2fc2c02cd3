//! Discovery event stream
//!
//! Registry changes are fanned out to subscribers (UI, connection managers)
//! as batches of immutable devices through a single broadcast stream.
//! Additions and removals are the only user-visible signals; unconfirmed
//! probes and malformed responses never produce an event.

use mount_transport::Device;

/// A batch of devices entering or leaving the registry
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Devices discovered this cycle
    ///
    /// Serial devices arrive as one batch per cycle; network devices arrive
    /// one per probe response.
    DevicesDiscovered {
        /// The discovered devices
        devices: Vec<Device>,
    },

    /// Devices removed after going unseen
    DevicesRemoved {
        /// The removed devices
        devices: Vec<Device>,
    },
}

impl DiscoveryEvent {
    /// The devices carried by this event
    pub fn devices(&self) -> &[Device] {
        match self {
            DiscoveryEvent::DevicesDiscovered { devices }
            | DiscoveryEvent::DevicesRemoved { devices } => devices,
        }
    }

    /// Check if this is a discovery (addition) event
    pub fn is_discovery(&self) -> bool {
        matches!(self, DiscoveryEvent::DevicesDiscovered { .. })
    }

    /// Check if this is a removal event
    pub fn is_removal(&self) -> bool {
        matches!(self, DiscoveryEvent::DevicesRemoved { .. })
    }
}
