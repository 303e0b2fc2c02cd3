//! Mount Simulation Library
//!
//! This crate provides a simulation layer for testing discovery and
//! transport functionality without physical mount hardware: a UDP endpoint
//! that speaks just enough of the mount protocol to answer discovery probes
//! and reject unknown commands.
//!
//! # Example
//!
//! ```rust,no_run
//! use mount_sim::{SimulatedMount, SimulatedMountConfig};
//!
//! # async fn run() -> std::io::Result<()> {
//! let mount = SimulatedMount::spawn(SimulatedMountConfig::default()).await?;
//! println!("Simulated mount listening on {}", mount.addr());
//! mount.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod mount;

pub use mount::{SimulatedMount, SimulatedMountConfig};
