//! Mount Discovery Library
//!
//! This crate locates controllable mount interfaces: COM serial ports
//! enumerated from the OS, and WiFi mount adapters found by broadcasting a
//! UDP probe on every usable network interface.
//!
//! Each call to [`DiscoveryService::discover`] runs one cycle. Serial ports
//! are diffed synchronously against the previous cycle; network endpoints go
//! through a two-cycle confirmation state machine, so a mount that misses a
//! single probe is not dropped. Subscribers receive batched
//! [`DiscoveryEvent`]s as devices come and go.
//!
//! # Example
//!
//! ```rust,no_run
//! use mount_discover::{DiscoveryConfig, DiscoveryService};
//!
//! # async fn run() {
//! let service = DiscoveryService::new(DiscoveryConfig::default());
//! let mut events = service.subscribe();
//!
//! service.discover().await;
//!
//! while let Ok(event) = events.recv().await {
//!     for device in event.devices() {
//!         println!("{}: {}", if event.is_discovery() { "found" } else { "lost" }, device);
//!     }
//! }
//! # }
//! ```

pub mod error;
pub mod events;
mod ifaces;
pub mod registry;
pub mod service;

pub use error::DiscoveryError;
pub use events::DiscoveryEvent;
pub use registry::DeviceRegistry;
pub use service::{
    run_discovery_loop, DiscoveryConfig, DiscoveryLoopCommand, DiscoveryService, DISCOVERY_PROBE,
};
