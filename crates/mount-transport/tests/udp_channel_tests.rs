//! Integration tests for the serial-over-UDP channel
//!
//! These tests run against a simulated mount on loopback and verify:
//! - Open/write/read round trips
//! - The write-cancels-prior-read property
//! - Discard semantics

use std::time::Duration;

use mount_sim::{SimulatedMount, SimulatedMountConfig};
use mount_transport::{Channel, UdpChannel};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Poll `read_existing` until a response shows up or the deadline passes
    pub async fn await_response(channel: &mut UdpChannel, deadline: Duration) -> String {
        let started = tokio::time::Instant::now();
        loop {
            let response = channel.read_existing();
            if !response.is_empty() {
                return response;
            }
            if started.elapsed() > deadline {
                return String::new();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn open_channel_to(mount: &SimulatedMount) -> UdpChannel {
        let mut channel = UdpChannel::new(mount.addr(), Duration::from_millis(500));
        channel.open().await.expect("open should succeed");
        channel
    }
}

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn probe_round_trip_returns_firmware_reply() {
    let mount = SimulatedMount::spawn(SimulatedMountConfig::default())
        .await
        .unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    channel.write(":e1\r").await.unwrap();
    let response = helpers::await_response(&mut channel, Duration::from_secs(1)).await;

    assert_eq!(response, "=0342AB\r");
    assert_eq!(mount.probe_count(), 1);
    mount.shutdown().await;
}

#[tokio::test]
async fn unknown_command_returns_error_reply() {
    let mount = SimulatedMount::spawn(SimulatedMountConfig::default())
        .await
        .unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    channel.write(":zz\r").await.unwrap();
    let response = helpers::await_response(&mut channel, Duration::from_secs(1)).await;

    assert_eq!(response, "!0\r");
    mount.shutdown().await;
}

#[tokio::test]
async fn read_existing_keeps_returning_the_latest_response() {
    let mount = SimulatedMount::spawn(SimulatedMountConfig::default())
        .await
        .unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    channel.write(":e1\r").await.unwrap();
    let first = helpers::await_response(&mut channel, Duration::from_secs(1)).await;
    assert_eq!(first, "=0342AB\r");
    // A second poll without a new write sees the same buffered payload
    assert_eq!(channel.read_existing(), "=0342AB\r");
    mount.shutdown().await;
}

// ============================================================================
// Write Cancels Prior Read
// ============================================================================

#[tokio::test]
async fn second_write_hides_the_first_response() {
    let config = SimulatedMountConfig {
        response_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let mount = SimulatedMount::spawn(config).await.unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    // The probe reply is still 100ms away when the second command goes out
    channel.write(":e1\r").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    channel.write(":zz\r").await.unwrap();

    // Sample continuously: the superseded probe reply must never be visible
    let started = tokio::time::Instant::now();
    let mut last = String::new();
    while started.elapsed() < Duration::from_millis(600) {
        let response = channel.read_existing();
        assert_ne!(response, "=0342AB\r", "stale response became observable");
        if !response.is_empty() {
            last = response;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(last, "!0\r");
    mount.shutdown().await;
}

// ============================================================================
// Discard Semantics
// ============================================================================

#[tokio::test]
async fn discard_in_buffer_clears_buffered_response() {
    let mount = SimulatedMount::spawn(SimulatedMountConfig::default())
        .await
        .unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    channel.write(":e1\r").await.unwrap();
    let response = helpers::await_response(&mut channel, Duration::from_secs(1)).await;
    assert!(!response.is_empty());

    channel.discard_in_buffer();
    assert_eq!(channel.read_existing(), "");
    mount.shutdown().await;
}

#[tokio::test]
async fn discard_out_buffer_cancels_pending_exchange() {
    let config = SimulatedMountConfig {
        response_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let mount = SimulatedMount::spawn(config).await.unwrap();
    let mut channel = helpers::open_channel_to(&mount).await;

    channel.write(":e1\r").await.unwrap();
    channel.discard_out_buffer();

    // The cancelled exchange's reply never becomes observable
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(channel.read_existing(), "");
    mount.shutdown().await;
}
