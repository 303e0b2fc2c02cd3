//! Mount Transport Library
//!
//! This crate provides the uniform command channel used to talk to telescope
//! mounts, regardless of the physical medium: a direct serial line (EQMOD
//! style cable) or a WiFi adapter bridging the serial protocol over UDP.
//!
//! Both backends satisfy the same [`Channel`] contract, so the protocol
//! layer above picks a discovered [`Device`] and does not care which medium
//! backs it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mount_transport::{Channel, UdpChannel};
//!
//! # async fn open_channel() -> Result<(), mount_transport::TransportError> {
//! let mut channel = UdpChannel::new(
//!     "192.168.4.1:11880".parse().unwrap(),
//!     Duration::from_millis(1000),
//! );
//! channel.open().await?;
//! channel.write(":e1\r").await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod device;
pub mod error;
pub mod serial;
pub mod udp;

pub use channel::Channel;
pub use device::{Device, DEFAULT_REMOTE_PORT};
pub use error::TransportError;
pub use serial::{FlowControlMode, ParityMode, SerialChannel, SerialConfig};
pub use udp::UdpChannel;
