//! Serial-over-UDP channel
//!
//! WiFi mount adapters bridge the serial protocol over connectionless UDP.
//! Because the protocol is a strict one-shot request/response exchange (never
//! pipelined), the channel keeps exactly one in-flight exchange: every
//! [`Channel::write`] cancels the previous exchange and starts a new
//! send-then-receive task.
//!
//! Each exchange owns its own connected socket. Adapters answer to the source
//! address of the request, so a late reply to a superseded command lands on a
//! socket that has already been dropped and can never be misread as the
//! current command's response.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::channel::{decode_payload, encode_payload, Channel};
use crate::error::TransportError;

/// One request/response exchange
struct Exchange {
    generation: u64,
    response: Option<String>,
}

/// Channel over a connectionless datagram socket
pub struct UdpChannel {
    remote: SocketAddr,
    read_timeout: Duration,
    socket: Option<Arc<UdpSocket>>,
    generation: Arc<AtomicU64>,
    exchange: Arc<Mutex<Option<Exchange>>>,
    task: Option<JoinHandle<()>>,
}

impl UdpChannel {
    /// Create an unopened channel to the given mount endpoint
    pub fn new(remote: SocketAddr, read_timeout: Duration) -> Self {
        Self {
            remote,
            read_timeout,
            socket: None,
            generation: Arc::new(AtomicU64::new(0)),
            exchange: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// The remote endpoint this channel targets
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    async fn connect_socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                target: self.remote.to_string(),
                reason: e.to_string(),
            })?;
        socket
            .connect(self.remote)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                target: self.remote.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(socket))
    }

    fn cancel_current(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Channel for UdpChannel {
    async fn open(&mut self) -> Result<(), TransportError> {
        let socket = self.connect_socket().await?;
        debug!("Opened UDP channel to {}", self.remote);
        self.socket = Some(socket);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    async fn write(&mut self, data: &str) -> Result<(), TransportError> {
        if self.socket.is_none() {
            return Err(TransportError::NotOpen);
        }

        self.cancel_current();

        // Fresh socket per exchange; dropping the previous one makes the OS
        // discard any late reply to the superseded command.
        let socket = self.connect_socket().await?;
        self.socket = Some(Arc::clone(&socket));

        let generation = self.generation.load(Ordering::SeqCst);
        *lock(&self.exchange) = Some(Exchange {
            generation,
            response: None,
        });

        let bytes = encode_payload(data);
        let current = Arc::clone(&self.generation);
        let exchange = Arc::clone(&self.exchange);
        let read_timeout = self.read_timeout;
        let remote = self.remote;

        self.task = Some(tokio::spawn(async move {
            if let Err(e) = socket.send(&bytes).await {
                trace!("Send to {} failed: {}", remote, e);
                return;
            }
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let mut buf = [0u8; 1024];
            let n = match timeout(read_timeout, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    trace!("Receive from {} failed: {}", remote, e);
                    return;
                }
                Err(_) => {
                    trace!("Receive from {} timed out", remote);
                    return;
                }
            };
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let payload = decode_payload(&buf[..n]);
            let mut guard = lock(&exchange);
            if let Some(ex) = guard.as_mut() {
                if ex.generation == generation {
                    ex.response = Some(payload);
                }
            }
        }));

        Ok(())
    }

    fn read_existing(&mut self) -> String {
        lock(&self.exchange)
            .as_ref()
            .and_then(|ex| ex.response.clone())
            .unwrap_or_default()
    }

    fn discard_in_buffer(&mut self) {
        if let Some(ex) = lock(&self.exchange).as_mut() {
            ex.response = None;
        }
    }

    fn discard_out_buffer(&mut self) {
        self.cancel_current();
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
