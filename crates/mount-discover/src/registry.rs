//! Device registry
//!
//! Bookkeeping for every device discovery knows about. Serial devices follow
//! a simple present/absent model driven by a snapshot diff, because port
//! enumeration is synchronous and authoritative each cycle. Network devices
//! go through a confirmation state machine per endpoint:
//!
//! ```text
//! Unknown --probe response--> Active --new cycle--> Dirty
//! Dirty --probe response (same cycle)--> Active      (id retained)
//! Dirty --cycle completes unconfirmed--> Removed
//! ```
//!
//! An endpoint is in at most one of {active, dirty} at any time, every
//! tracked id maps to a device, and synthetic ids are strictly decreasing
//! and never reused while the owning device is still tracked.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;

use mount_transport::Device;
use tracing::{debug, trace};

/// Registry of known devices and their confirmation state
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    /// Every device seen and not yet pruned, keyed by index
    all: HashMap<i32, Device>,
    /// Network endpoints confirmed responsive this cycle
    active: HashMap<SocketAddr, i32>,
    /// Network endpoints active last cycle, unconfirmed this cycle
    dirty: HashMap<SocketAddr, i32>,
    /// Serial indices present in the previous enumeration snapshot
    serial: BTreeSet<i32>,
    /// Most recently allocated synthetic id (0 means none allocated yet)
    last_remote_id: i32,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every endpoint still dirty from the previous cycle
    ///
    /// Called at the start of a cycle, so anything still dirty has gone two
    /// cycles without a probe response. Returns the removed devices.
    pub fn purge_dirty(&mut self) -> Vec<Device> {
        let mut removed = Vec::new();
        for (endpoint, index) in self.dirty.drain() {
            if let Some(device) = self.all.remove(&index) {
                debug!("Removing unresponsive device {} at {}", index, endpoint);
                removed.push(device);
            }
        }
        removed
    }

    /// Demote every active network endpoint to dirty, retaining its id
    ///
    /// Only a probe response received later in the same cycle moves an
    /// endpoint back to active.
    pub fn mark_active_dirty(&mut self) {
        for (endpoint, index) in self.active.drain() {
            self.dirty.insert(endpoint, index);
        }
    }

    /// Record a valid probe response from `endpoint`
    ///
    /// Reconfirms a dirty or already-active endpoint under its existing id,
    /// or allocates the next synthetic id for a previously unseen endpoint.
    /// Returns the registry's device for the endpoint.
    pub fn confirm_endpoint(&mut self, endpoint: SocketAddr) -> Option<Device> {
        if let Some(index) = self.dirty.remove(&endpoint) {
            trace!("Reconfirmed dirty device {} at {}", index, endpoint);
            self.active.insert(endpoint, index);
            // Promotion replaces the entry with a freshly stamped device
            // under the same immutable id
            let device = Device::remote(index, endpoint).ok()?;
            self.all.insert(index, device);
            return Some(device);
        }
        if let Some(&index) = self.active.get(&endpoint) {
            trace!("Duplicate confirmation for device {} at {}", index, endpoint);
            return self.all.get(&index).copied();
        }

        self.last_remote_id -= 1;
        let index = self.last_remote_id;
        let device = Device::remote(index, endpoint).ok()?;
        debug!("Allocated device {} for new endpoint {}", index, endpoint);
        self.all.insert(index, device);
        self.active.insert(endpoint, index);
        Some(device)
    }

    /// Diff a serial port snapshot against the previous cycle's
    ///
    /// Returns the (added, removed) device batches.
    pub fn sync_serial_ports(&mut self, indices: &BTreeSet<i32>) -> (Vec<Device>, Vec<Device>) {
        let mut added = Vec::new();
        for &index in indices.difference(&self.serial) {
            let Ok(device) = Device::serial(index) else {
                continue;
            };
            self.all.insert(index, device);
            added.push(device);
        }

        let mut removed = Vec::new();
        for &index in self.serial.difference(indices) {
            if let Some(device) = self.all.remove(&index) {
                removed.push(device);
            }
        }

        self.serial = indices.clone();
        (added, removed)
    }

    /// Serial devices plus network devices confirmed responsive this cycle
    pub fn active_devices(&self) -> Vec<Device> {
        let serial = self.serial.iter().filter_map(|index| self.all.get(index));
        let network = self.active.values().filter_map(|index| self.all.get(index));
        serial.chain(network).copied().collect()
    }

    /// Every tracked device, including dirty network devices
    pub fn all_devices(&self) -> Vec<Device> {
        self.all.values().copied().collect()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.all.clear();
        self.active.clear();
        self.dirty.clear();
        self.serial.clear();
    }
}
