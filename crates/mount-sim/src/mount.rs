//! Simulated mount endpoint
//!
//! Binds a UDP socket on loopback and answers datagrams the way a WiFi
//! mount adapter does: `:e1\r` gets a firmware-version reply, any other
//! `:`-command gets the error reply, anything else is ignored as noise.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Configuration for a simulated mount
#[derive(Debug, Clone)]
pub struct SimulatedMountConfig {
    /// Firmware version payload returned for the `:e1` probe, without the
    /// leading `=` or trailing `\r`
    pub firmware_version: String,
    /// Artificial delay before each reply
    pub response_delay: Duration,
}

impl Default for SimulatedMountConfig {
    fn default() -> Self {
        Self {
            firmware_version: "0342AB".to_string(),
            response_delay: Duration::ZERO,
        }
    }
}

/// A running simulated mount
pub struct SimulatedMount {
    addr: SocketAddr,
    probe_count: Arc<AtomicUsize>,
    responding: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SimulatedMount {
    /// Bind a loopback socket and start answering datagrams
    pub async fn spawn(config: SimulatedMountConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = socket.local_addr()?;
        let probe_count = Arc::new(AtomicUsize::new(0));
        let responding = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(run_mount(
            socket,
            config,
            Arc::clone(&probe_count),
            Arc::clone(&responding),
            shutdown_rx,
        ));

        debug!("Simulated mount listening on {}", addr);
        Ok(Self {
            addr,
            probe_count,
            responding,
            shutdown_tx,
            task,
        })
    }

    /// The loopback address the mount listens on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of `:e1` probes answered so far
    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// Start or stop answering datagrams (the mount keeps receiving either
    /// way, like real hardware that has wandered out of WiFi range)
    pub fn set_responding(&self, responding: bool) {
        self.responding.store(responding, Ordering::SeqCst);
    }

    /// Stop the mount and wait for its task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

async fn run_mount(
    socket: UdpSocket,
    config: SimulatedMountConfig,
    probe_count: Arc<AtomicUsize>,
    responding: Arc<AtomicBool>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Simulated mount shutting down");
                break;
            }

            result = socket.recv_from(&mut buf) => {
                let (n, src) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        trace!("Simulated mount receive error: {}", e);
                        continue;
                    }
                };

                let command: String = buf[..n].iter().map(|&b| b as char).collect();
                let Some(reply) = reply_for(&command, &config.firmware_version) else {
                    trace!("Ignoring noise datagram from {}", src);
                    continue;
                };

                if !responding.load(Ordering::SeqCst) {
                    trace!("Mount not responding, dropping {:?} from {}", command, src);
                    continue;
                }
                if command.starts_with(":e1") {
                    probe_count.fetch_add(1, Ordering::SeqCst);
                }

                if !config.response_delay.is_zero() {
                    tokio::time::sleep(config.response_delay).await;
                }

                let bytes: Vec<u8> = reply.chars().map(|c| (c as u32 & 0xFF) as u8).collect();
                if let Err(e) = socket.send_to(&bytes, src).await {
                    trace!("Simulated mount send error: {}", e);
                }
            }
        }
    }
}

/// Reply for one received frame, or `None` for noise that a real mount
/// would not answer
fn reply_for(command: &str, firmware_version: &str) -> Option<String> {
    let frame = command.trim_end_matches('\r');
    if !frame.starts_with(':') {
        return None;
    }
    if frame == ":e1" {
        Some(format!("={firmware_version}\r"))
    } else {
        Some("!0\r".to_string())
    }
}
