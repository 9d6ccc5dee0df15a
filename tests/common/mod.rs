//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use envdash_rs::dashboard::{Dashboard, DashboardEvent};
use envdash_rs::types::DashboardSnapshot;
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Pick the last snapshot out of a batch of dashboard events
pub fn last_snapshot(events: Vec<DashboardEvent>) -> Option<DashboardSnapshot> {
    events.into_iter().rev().find_map(|event| match event {
        DashboardEvent::Snapshot(snapshot) => Some(snapshot),
        _ => None,
    })
}

/// Numeric chart series for a channel, in arrival order
pub fn chart_values(dashboard: &Dashboard, key: &str) -> Vec<f64> {
    dashboard
        .store()
        .history(key)
        .map(|history| history.values())
        .unwrap_or_default()
}

/// Poll `condition` until it holds or the test timeout expires
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
