//! Refresh scheduler
//!
//! Decides when the presentation layer gets a new [`DashboardSnapshot`].
//! Latest values are read on the value cadence (default 1 s) and chart series
//! on the slower chart cadence (default 5 s); between chart ticks the last
//! chart series are reused.
//!
//! The scheduler never blocks: the owner calls [`RefreshScheduler::poll`]
//! with the current time and gets a snapshot back only when a tick is due.
//! Missed ticks are skipped rather than replayed.

use crate::registry::ChannelRegistry;
use crate::store::SensorStore;
use crate::types::{ConnectionState, DashboardSnapshot, ModeState, Sample};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default value refresh interval in milliseconds
pub const DEFAULT_VALUE_INTERVAL_MS: u64 = 1000;

/// Default chart refresh interval in milliseconds
pub const DEFAULT_CHART_INTERVAL_MS: u64 = 5000;

/// Read-only view of the state a snapshot is built from
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSource<'a> {
    pub mode: ModeState,
    pub connection: ConnectionState,
    pub registry: &'a ChannelRegistry,
    pub store: &'a SensorStore,
}

/// Cloneable cancellation flag for a [`RefreshScheduler`]
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle {
    cancelled: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Stop the scheduler; no snapshot is produced afterwards
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Two-cadence snapshot timer
#[derive(Debug)]
pub struct RefreshScheduler {
    value_interval: Duration,
    chart_interval: Duration,
    /// `None` means due on the next poll
    next_value: Option<Instant>,
    next_chart: Option<Instant>,
    cached_charts: BTreeMap<String, Vec<Sample>>,
    chart_version: u64,
    handle: SchedulerHandle,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_VALUE_INTERVAL_MS),
            Duration::from_millis(DEFAULT_CHART_INTERVAL_MS),
        )
    }
}

impl RefreshScheduler {
    /// Create a scheduler; both cadences are due on the first poll
    ///
    /// Zero intervals are raised to one millisecond.
    pub fn new(value_interval: Duration, chart_interval: Duration) -> Self {
        let floor = Duration::from_millis(1);
        Self {
            value_interval: value_interval.max(floor),
            chart_interval: chart_interval.max(floor),
            next_value: None,
            next_chart: None,
            cached_charts: BTreeMap::new(),
            chart_version: 0,
            handle: SchedulerHandle::default(),
        }
    }

    pub fn value_interval(&self) -> Duration {
        self.value_interval
    }

    pub fn chart_interval(&self) -> Duration {
        self.chart_interval
    }

    /// Handle that can cancel this scheduler from another thread
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Force the chart series to be re-read on the next poll
    ///
    /// Called after the stores were cleared so the UI does not keep showing
    /// series from the previous mode.
    pub fn invalidate_charts(&mut self) {
        self.next_chart = None;
        self.next_value = None;
    }

    /// Earliest instant at which `poll` may return a snapshot
    pub fn next_due(&self) -> Option<Instant> {
        match (self.next_value, self.next_chart) {
            (Some(value), Some(chart)) => Some(value.min(chart)),
            _ => None,
        }
    }

    /// Produce a snapshot if a value or chart tick is due at `now`
    pub fn poll(&mut self, now: Instant, source: SnapshotSource<'_>) -> Option<DashboardSnapshot> {
        if self.is_cancelled() {
            return None;
        }

        let value_due = self.next_value.map_or(true, |at| now >= at);
        let chart_due = self.next_chart.map_or(true, |at| now >= at);
        if !value_due && !chart_due {
            return None;
        }

        if chart_due {
            self.cached_charts = source.store.chart_snapshots();
            self.chart_version = source.store.version();
            self.next_chart = Some(advance(self.next_chart, self.chart_interval, now));
        }
        if value_due {
            self.next_value = Some(advance(self.next_value, self.value_interval, now));
        }

        Some(source.assemble(self.cached_charts.clone(), self.chart_version))
    }
}

impl SnapshotSource<'_> {
    /// Snapshot with chart series read right now, bypassing the cadences
    pub fn capture(self) -> DashboardSnapshot {
        self.assemble(self.store.chart_snapshots(), self.store.version())
    }

    fn assemble(
        self,
        charts: BTreeMap<String, Vec<Sample>>,
        chart_version: u64,
    ) -> DashboardSnapshot {
        let values = self
            .registry
            .all_channels()
            .map(|channel| (channel.key.clone(), self.store.latest(&channel.key).cloned()))
            .collect();

        DashboardSnapshot {
            mode: self.mode,
            connection: self.connection,
            data_version: self.store.version(),
            chart_version,
            values,
            charts,
        }
    }
}

/// Next deadline after `now`, keeping the original phase when on time
fn advance(previous: Option<Instant>, interval: Duration, now: Instant) -> Instant {
    match previous {
        Some(at) if at + interval > now => at + interval,
        _ => now + interval,
    }
}
