//! Integration tests for the dashboard runner thread
//!
//! These tests validate the complete runner workflow:
//! - Snapshot delivery and shutdown
//! - Commands from the presentation layer
//! - Fallback to simulated data against an unreachable broker

mod common;

use common::builders::ConfigBuilder;
use common::mock_helpers::idle_transport;
use common::test_timeout;
use envdash_rs::config::BrokerConfig;
use envdash_rs::dashboard::{Dashboard, DashboardEvent, DashboardHandle, DashboardRunner};
use envdash_rs::mode::ModeChangeCause;
use envdash_rs::transport::{BackoffPolicy, MqttTransport};
use envdash_rs::types::{DashboardSnapshot, ModeState, SampleValue};
use serial_test::serial;
use std::time::{Duration, Instant};

/// Wait for the first event matching `pick`
fn wait_for<T>(
    handle: &DashboardHandle,
    mut pick: impl FnMut(DashboardEvent) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + test_timeout() * 3;
    while Instant::now() < deadline {
        if let Some(event) = handle.recv_timeout(Duration::from_millis(50)) {
            if let Some(found) = pick(event) {
                return Some(found);
            }
        }
    }
    None
}

fn snapshot_where(
    handle: &DashboardHandle,
    mut predicate: impl FnMut(&DashboardSnapshot) -> bool,
) -> Option<DashboardSnapshot> {
    wait_for(handle, |event| match event {
        DashboardEvent::Snapshot(snapshot) if predicate(&snapshot) => Some(snapshot),
        _ => None,
    })
}

#[test]
#[serial]
fn test_runner_creation_and_shutdown() {
    let config = ConfigBuilder::new().refresh_ms(20, 50).build();
    let dashboard = Dashboard::new(&config, Box::new(idle_transport())).unwrap();
    let (runner, handle) = DashboardRunner::new(dashboard);
    let thread = runner.with_apply_interval(Duration::from_millis(10)).spawn().unwrap();

    let snapshot = snapshot_where(&handle, |_| true).expect("no snapshot received");
    assert!(snapshot.is_simulated());
    assert!(snapshot.value("temp").is_some());

    handle.shutdown();
    assert!(thread.join().is_ok(), "Runner thread should exit cleanly");

    let remaining = handle.drain();
    assert_eq!(remaining.last(), Some(&DashboardEvent::Shutdown));
    assert!(handle.recv_timeout(Duration::from_millis(50)).is_none());
}

#[test]
#[serial]
fn test_inject_and_toggle_through_handle() {
    let config = ConfigBuilder::new().refresh_ms(20, 50).build();
    let dashboard = Dashboard::new(&config, Box::new(idle_transport())).unwrap();
    let (runner, handle) = DashboardRunner::new(dashboard);
    let thread = runner.with_apply_interval(Duration::from_millis(10)).spawn().unwrap();

    handle.inject("ai/环境建议", "空气质量良好");
    let snapshot =
        snapshot_where(&handle, |s| s.value("advice").is_some()).expect("advice never arrived");
    assert_eq!(
        snapshot.value("advice"),
        Some(&SampleValue::Text("空气质量良好".into()))
    );

    handle.toggle_mode();
    let change = wait_for(&handle, |event| match event {
        DashboardEvent::ModeChanged(change) => Some(change),
        _ => None,
    })
    .expect("no mode change reported");
    assert_eq!(change.to, ModeState::Live);
    assert_eq!(change.cause, ModeChangeCause::UserToggle);

    let snapshot = snapshot_where(&handle, |s| s.mode == ModeState::Live).unwrap();
    assert!(snapshot.charts.values().all(Vec::is_empty));

    handle.shutdown();
    thread.join().unwrap();
}

#[test]
#[serial]
fn test_unreachable_broker_falls_back_to_simulated() {
    let mut config = ConfigBuilder::new().refresh_ms(20, 50).failure_threshold(3).build();
    let broker = BrokerConfig {
        host: "127.0.0.1".into(),
        port: 1,
        connect_timeout_ms: 300,
        ..BrokerConfig::default()
    };
    config.broker = Some(broker.clone());
    config.backoff = BackoffPolicy {
        base_ms: 20,
        cap_ms: 50,
        ..BackoffPolicy::default()
    };

    let transport = MqttTransport::new(broker, config.backoff);
    let dashboard = Dashboard::new(&config, Box::new(transport)).unwrap();
    let (runner, handle) = DashboardRunner::new(dashboard);
    let thread = runner.with_apply_interval(Duration::from_millis(10)).spawn().unwrap();

    let change = wait_for(&handle, |event| match event {
        DashboardEvent::ModeChanged(change) => Some(change),
        _ => None,
    })
    .expect("dashboard never fell back");
    assert_eq!(change.from, ModeState::Live);
    assert_eq!(change.to, ModeState::Simulated);
    assert!(change.is_automatic());

    let snapshot = snapshot_where(&handle, |s| s.is_simulated() && s.value("temp").is_some());
    assert!(snapshot.is_some());

    handle.shutdown();
    thread.join().unwrap();
}
