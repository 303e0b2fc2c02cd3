//! Discovery service
//!
//! Orchestrates one discovery cycle at a time: enumerate serial ports
//! synchronously, then fan a `:e1` probe out over every usable network
//! interface and promote endpoints in the registry as responses arrive.
//! `discover` returns as soon as the probes are dispatched; responses are
//! handled on the runtime's worker threads.
//!
//! A failing enumeration source (serial ports or network interfaces) is
//! logged and skipped for that cycle; the other source still runs.

use std::collections::{BTreeSet, HashMap};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use mount_transport::{Device, DEFAULT_REMOTE_PORT};

use crate::error::DiscoveryError;
use crate::events::DiscoveryEvent;
use crate::ifaces;
use crate::registry::DeviceRegistry;

/// The discovery probe broadcast to locate responsive mounts
pub const DISCOVERY_PROBE: &[u8] = b":e1\r";

/// Capacity of the discovery event stream
const EVENT_CAPACITY: usize = 64;

/// Discovery service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// UDP port mounts listen on
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
    /// Minimum interval between executed cycles, in milliseconds
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Enumerate serial ports
    #[serde(default = "default_true")]
    pub serial: bool,
    /// Probe for WiFi mounts
    #[serde(default = "default_true")]
    pub network: bool,
}

fn default_remote_port() -> u16 {
    DEFAULT_REMOTE_PORT
}

fn default_cycle_interval_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            remote_port: DEFAULT_REMOTE_PORT,
            cycle_interval_ms: 2000,
            serial: true,
            network: true,
        }
    }
}

impl DiscoveryConfig {
    /// Minimum interval between executed cycles
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    /// How long a dispatched probe waits for a response, bounded so probe
    /// tasks from one cycle are gone well before the grace window closes
    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms.saturating_sub(200).max(200))
    }
}

/// Commands accepted by [`run_discovery_loop`]
#[derive(Debug)]
pub enum DiscoveryLoopCommand {
    /// Enable or disable network probing at runtime
    SetNetworkDiscovery(bool),
    /// Stop the loop
    Shutdown,
}

/// Locates mount interfaces on serial ports and the local WiFi networks
pub struct DiscoveryService {
    config: DiscoveryConfig,
    registry: Arc<Mutex<DeviceRegistry>>,
    senders: Mutex<HashMap<Ipv4Addr, Arc<UdpSocket>>>,
    events: broadcast::Sender<DiscoveryEvent>,
    last_cycle: Mutex<Option<Instant>>,
    network_enabled: AtomicBool,
    disposed: Arc<AtomicBool>,
}

impl DiscoveryService {
    /// Create a service with the given configuration
    pub fn new(config: DiscoveryConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let network_enabled = AtomicBool::new(config.network);
        Self {
            config,
            registry: Arc::new(Mutex::new(DeviceRegistry::new())),
            senders: Mutex::new(HashMap::new()),
            events,
            last_cycle: Mutex::new(None),
            network_enabled,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The configuration this service runs with
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    /// Enable or disable network probing for subsequent cycles
    pub fn set_network_discovery(&self, enabled: bool) {
        info!("Network discovery {}", if enabled { "enabled" } else { "disabled" });
        self.network_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether network probing is currently enabled
    pub fn network_discovery(&self) -> bool {
        self.network_enabled.load(Ordering::SeqCst)
    }

    /// Serial devices plus network devices confirmed in the current cycle
    pub fn active_devices(&self) -> Vec<Device> {
        lock(&self.registry).active_devices()
    }

    /// Every tracked device, including those within the removal grace window
    pub fn all_devices(&self) -> Vec<Device> {
        lock(&self.registry).all_devices()
    }

    /// Run one discovery cycle
    ///
    /// Self-throttled: a call less than the cycle interval after the previous
    /// executed cycle is a no-op. Returns as soon as probes are dispatched;
    /// network responses promote devices asynchronously.
    pub async fn discover(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut last = lock(&self.last_cycle);
            let now = Instant::now();
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.config.cycle_interval() {
                    trace!("Discovery throttled");
                    return;
                }
            }
            *last = Some(now);
        }
        debug!("Discovery cycle started");

        let network = self.network_discovery();
        if network {
            self.refresh_senders();
        }

        // Anything still dirty has now gone two cycles without a response
        let removed = lock(&self.registry).purge_dirty();
        self.emit_removed(removed);
        lock(&self.registry).mark_active_dirty();

        if self.config.serial {
            self.discover_serial_ports();
        }
        if network {
            self.dispatch_probes();
        }
    }

    /// Drop all registry state and close every sender
    ///
    /// Safe to call more than once and concurrently with in-flight probe
    /// callbacks, which check the disposed flag before touching the registry.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.senders).clear();
        lock(&self.registry).clear();
        info!("Discovery service disposed");
    }

    /// Rebuild the per-interface broadcast sender pool
    fn refresh_senders(&self) {
        let addrs = match ifaces::broadcast_capable_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!("Skipping network discovery this cycle: {}", e);
                return;
            }
        };

        let mut senders = lock(&self.senders);
        senders.retain(|addr, _| {
            let keep = addrs.contains(addr);
            if !keep {
                debug!("Dropping sender for vanished interface {}", addr);
            }
            keep
        });

        for addr in addrs {
            if senders.contains_key(&addr) {
                continue;
            }
            match bind_broadcast_sender(addr) {
                Ok(socket) => {
                    debug!("Created broadcast sender on {}", addr);
                    senders.insert(addr, Arc::new(socket));
                }
                Err(e) => warn!("{}", e),
            }
        }
    }

    /// Enumerate serial ports and diff against the previous snapshot
    fn discover_serial_ports(&self) {
        let ports = match serialport::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!(
                    "Skipping serial discovery this cycle: {}",
                    DiscoveryError::SerialEnumeration(e.to_string())
                );
                return;
            }
        };

        let indices: BTreeSet<i32> = ports
            .iter()
            .filter_map(|port| port_index(&port.port_name))
            .collect();

        let (added, removed) = lock(&self.registry).sync_serial_ports(&indices);
        if !added.is_empty() {
            info!("Found {} new serial device(s)", added.len());
            let _ = self
                .events
                .send(DiscoveryEvent::DevicesDiscovered { devices: added });
        }
        self.emit_removed(removed);
    }

    /// Send the probe from every sender and await one response each
    fn dispatch_probes(&self) {
        let senders: Vec<(Ipv4Addr, Arc<UdpSocket>)> = lock(&self.senders)
            .iter()
            .map(|(addr, socket)| (*addr, Arc::clone(socket)))
            .collect();
        if senders.is_empty() {
            trace!("No usable broadcast interfaces");
            return;
        }

        let target = SocketAddr::from((Ipv4Addr::BROADCAST, self.config.remote_port));
        let probe_timeout = self.config.probe_timeout();

        for (addr, socket) in senders {
            let registry = Arc::clone(&self.registry);
            let events = self.events.clone();
            let disposed = Arc::clone(&self.disposed);

            tokio::spawn(async move {
                if let Err(e) = socket.send_to(DISCOVERY_PROBE, target).await {
                    trace!("Probe send on {} failed: {}", addr, e);
                    return;
                }

                let mut buf = [0u8; 1024];
                let (n, origin) = match timeout(probe_timeout, socket.recv_from(&mut buf)).await {
                    Ok(Ok(pair)) => pair,
                    Ok(Err(e)) => {
                        trace!("Probe receive on {} failed: {}", addr, e);
                        return;
                    }
                    Err(_) => {
                        trace!("No probe response on {}", addr);
                        return;
                    }
                };

                if disposed.load(Ordering::SeqCst) {
                    return;
                }
                handle_probe_response(&registry, &events, &buf[..n], origin);
            });
        }
    }

    fn emit_removed(&self, removed: Vec<Device>) {
        if removed.is_empty() {
            return;
        }
        info!("Removed {} device(s)", removed.len());
        let _ = self
            .events
            .send(DiscoveryEvent::DevicesRemoved { devices: removed });
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Run periodic discovery until a shutdown command arrives
///
/// Each iteration runs one cycle and then sleeps for the configured
/// interval, so consecutive cycles always clear the service's own throttle.
pub async fn run_discovery_loop(
    service: Arc<DiscoveryService>,
    mut command_rx: mpsc::Receiver<DiscoveryLoopCommand>,
) {
    info!("Auto discovery started");
    loop {
        service.discover().await;

        tokio::select! {
            _ = tokio::time::sleep(service.config.cycle_interval()) => {}
            command = command_rx.recv() => match command {
                Some(DiscoveryLoopCommand::SetNetworkDiscovery(enabled)) => {
                    service.set_network_discovery(enabled);
                }
                Some(DiscoveryLoopCommand::Shutdown) | None => break,
            },
        }
    }
    info!("Auto discovery stopped");
}

/// Bind a non-blocking broadcast socket on the given interface address
fn bind_broadcast_sender(addr: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
    let bind = |addr: Ipv4Addr| -> std::io::Result<UdpSocket> {
        let socket = std::net::UdpSocket::bind((addr, 0))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        UdpSocket::from_std(socket)
    };
    bind(addr).map_err(|source| DiscoveryError::Bind { addr, source })
}

/// Promote the responding endpoint if the datagram is a valid probe response
fn handle_probe_response(
    registry: &Mutex<DeviceRegistry>,
    events: &broadcast::Sender<DiscoveryEvent>,
    data: &[u8],
    origin: SocketAddr,
) {
    let response = decode_response(data);
    if !is_valid_response(&response) {
        trace!("Ignoring noise datagram from {}", origin);
        return;
    }

    let device = lock(registry).confirm_endpoint(origin);
    if let Some(device) = device {
        info!("Mount at {} responded (device {})", origin, device.index());
        let _ = events.send(DiscoveryEvent::DevicesDiscovered {
            devices: vec![device],
        });
    }
}

/// Decode a received datagram: one char per byte, NUL bytes stripped, trimmed
fn decode_response(data: &[u8]) -> String {
    let text: String = data
        .iter()
        .map(|&b| b as char)
        .filter(|&c| c != '\0')
        .collect();
    text.trim().to_string()
}

/// A response is valid when it is longer than two characters and starts
/// with the success marker
fn is_valid_response(response: &str) -> bool {
    response.len() > 2 && response.starts_with('=')
}

/// Extract the first positive integer embedded in a port name
///
/// `COM3` yields 3; names without a positive number (`/dev/ttyUSB0`) are
/// not usable as device indices and yield `None`.
fn port_index(name: &str) -> Option<i32> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = name[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()?;
    let index = digits.parse::<i32>().ok()?;
    (index >= 1).then_some(index)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
