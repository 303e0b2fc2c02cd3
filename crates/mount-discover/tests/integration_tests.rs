//! Integration tests for mount discovery
//!
//! These tests verify end-to-end behavior of the public discovery surface:
//! - The network endpoint confirmation state machine
//! - Serial snapshot diffing
//! - Device identity stability and id allocation
//! - Service lifecycle (subscribe, dispose)

use std::collections::BTreeSet;
use std::net::SocketAddr;

use mount_discover::{DeviceRegistry, DiscoveryConfig, DiscoveryService};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn endpoint(n: u8) -> SocketAddr {
        format!("192.168.4.{n}:11880").parse().unwrap()
    }

    /// Run a full cycle's worth of registry bookkeeping with the given
    /// endpoints responding
    pub fn cycle(registry: &mut DeviceRegistry, responding: &[SocketAddr]) {
        registry.purge_dirty();
        registry.mark_active_dirty();
        for &endpoint in responding {
            registry.confirm_endpoint(endpoint);
        }
    }
}

// ============================================================================
// Endpoint State Machine
// ============================================================================

#[test]
fn device_survives_exactly_one_missed_cycle() {
    let mut registry = DeviceRegistry::new();
    registry.confirm_endpoint(helpers::endpoint(1)).unwrap();

    helpers::cycle(&mut registry, &[]);
    assert_eq!(
        registry.all_devices().len(),
        1,
        "device must survive the first missed cycle"
    );
    assert!(registry.active_devices().is_empty());

    helpers::cycle(&mut registry, &[]);
    assert!(
        registry.all_devices().is_empty(),
        "device must be purged after two missed cycles"
    );
}

#[test]
fn dirty_device_reclaims_its_id_on_reconfirmation() {
    let mut registry = DeviceRegistry::new();
    let first = registry.confirm_endpoint(helpers::endpoint(1)).unwrap();

    registry.purge_dirty();
    registry.mark_active_dirty();
    let reconfirmed = registry.confirm_endpoint(helpers::endpoint(1)).unwrap();

    assert_eq!(reconfirmed.index(), first.index());
    assert_eq!(registry.active_devices().len(), 1);
}

#[test]
fn flapping_device_gets_a_fresh_id_after_removal() {
    let mut registry = DeviceRegistry::new();
    let first = registry.confirm_endpoint(helpers::endpoint(1)).unwrap();

    helpers::cycle(&mut registry, &[]);
    helpers::cycle(&mut registry, &[]);
    assert!(registry.all_devices().is_empty());

    let second = registry.confirm_endpoint(helpers::endpoint(1)).unwrap();
    assert!(second.index() < first.index());
}

#[test]
fn several_endpoints_track_independently() {
    let mut registry = DeviceRegistry::new();
    let a = helpers::endpoint(1);
    let b = helpers::endpoint(2);

    helpers::cycle(&mut registry, &[a, b]);
    assert_eq!(registry.active_devices().len(), 2);

    // b stops responding; a keeps going
    helpers::cycle(&mut registry, &[a]);
    assert_eq!(registry.active_devices().len(), 1);
    assert_eq!(registry.all_devices().len(), 2);

    helpers::cycle(&mut registry, &[a]);
    assert_eq!(registry.all_devices().len(), 1);
    assert_eq!(registry.all_devices()[0].endpoint(), Some(a));
}

// ============================================================================
// Serial Snapshot Diffing
// ============================================================================

#[test]
fn serial_diff_reports_only_changes() {
    let mut registry = DeviceRegistry::new();

    let (added, removed) = registry.sync_serial_ports(&BTreeSet::from([3, 5]));
    assert_eq!(added.len(), 2);
    assert!(removed.is_empty());

    let (added, removed) = registry.sync_serial_ports(&BTreeSet::from([5, 7]));
    let added: Vec<i32> = added.iter().map(|d| d.index()).collect();
    let removed: Vec<i32> = removed.iter().map(|d| d.index()).collect();
    assert_eq!(added, vec![7]);
    assert_eq!(removed, vec![3]);

    // Unchanged snapshot produces no churn
    let (added, removed) = registry.sync_serial_ports(&BTreeSet::from([5, 7]));
    assert!(added.is_empty());
    assert!(removed.is_empty());
}

#[test]
fn serial_devices_display_as_com_ports() {
    let mut registry = DeviceRegistry::new();
    let (added, _) = registry.sync_serial_ports(&BTreeSet::from([3]));
    assert_eq!(added[0].to_string(), "COM3");
    assert!(added[0].is_serial());
    assert!(added[0].endpoint().is_none());
}

// ============================================================================
// Service Lifecycle
// ============================================================================

fn quiet_config() -> DiscoveryConfig {
    DiscoveryConfig {
        serial: false,
        network: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn service_starts_empty() {
    let service = DiscoveryService::new(quiet_config());
    assert!(service.all_devices().is_empty());
    assert!(service.active_devices().is_empty());
}

#[tokio::test]
async fn rapid_discover_calls_are_safe() {
    let service = DiscoveryService::new(quiet_config());
    for _ in 0..5 {
        service.discover().await;
    }
    assert!(service.all_devices().is_empty());
}

#[tokio::test]
async fn dispose_twice_leaves_registry_empty() {
    let service = DiscoveryService::new(quiet_config());
    service.discover().await;
    service.dispose();
    service.dispose();
    assert!(service.all_devices().is_empty());
}

#[tokio::test]
async fn network_toggle_round_trips() {
    let service = DiscoveryService::new(quiet_config());
    assert!(!service.network_discovery());
    service.set_network_discovery(true);
    assert!(service.network_discovery());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Fresh endpoints get strictly decreasing ids; re-seen endpoints
        /// keep the id they were assigned
        #[test]
        fn synthetic_ids_strictly_decrease(hosts in proptest::collection::vec(1u8..=250, 1..40)) {
            let mut registry = DeviceRegistry::new();
            let mut assigned = std::collections::HashMap::new();
            let mut lowest = 0i32;
            for host in hosts {
                let device = registry.confirm_endpoint(helpers::endpoint(host)).unwrap();
                match assigned.get(&host) {
                    Some(&id) => prop_assert_eq!(device.index(), id),
                    None => {
                        prop_assert!(device.index() < lowest);
                        lowest = device.index();
                        assigned.insert(host, lowest);
                    }
                }
            }
        }

        /// An endpoint that responds every cycle never changes identity
        #[test]
        fn stable_endpoint_keeps_index(cycles in 1usize..50) {
            let mut registry = DeviceRegistry::new();
            let endpoint = helpers::endpoint(1);
            let first = registry.confirm_endpoint(endpoint).unwrap();
            for _ in 0..cycles {
                helpers::cycle(&mut registry, &[endpoint]);
            }
            let devices = registry.all_devices();
            prop_assert_eq!(devices.len(), 1);
            prop_assert_eq!(devices[0].index(), first.index());
        }

        /// At most one of {active, dirty} holds an endpoint: the device
        /// count never exceeds the number of distinct endpoints
        #[test]
        fn device_count_bounded_by_distinct_endpoints(
            rounds in proptest::collection::vec(
                proptest::collection::vec(1u8..=5, 0..5),
                1..10,
            )
        ) {
            let mut registry = DeviceRegistry::new();
            for round in rounds {
                let endpoints: Vec<SocketAddr> =
                    round.iter().map(|&n| helpers::endpoint(n)).collect();
                helpers::cycle(&mut registry, &endpoints);
                prop_assert!(registry.all_devices().len() <= 5);
                prop_assert!(registry.active_devices().len() <= endpoints.len());
            }
        }
    }
}
