//! Sensor data stores
//!
//! [`SensorStore`] owns one [`HistoryBuffer`] per chartable channel and the
//! [`LatestValueStore`] for every channel. It is single-threaded: all writes
//! happen in the dashboard's apply step.
//!
//! The store keeps a monotonically increasing data version that changes on
//! every mutation, which lets the refresh scheduler produce identical
//! snapshots when nothing arrived between ticks.

pub mod history;
pub mod latest;

pub use history::HistoryBuffer;
pub use latest::LatestValueStore;

use crate::error::{EnvDashError, Result};
use crate::registry::ChannelRegistry;
use crate::types::Sample;
use std::collections::BTreeMap;

/// Default number of samples kept per chart channel
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Latest values plus chart history for every channel
#[derive(Debug, Clone)]
pub struct SensorStore {
    latest: LatestValueStore,
    /// Chart histories keyed by channel key (sorted for stable snapshots)
    histories: BTreeMap<String, HistoryBuffer>,
    version: u64,
}

impl SensorStore {
    /// Create a history buffer for each chartable channel in the registry
    pub fn new(registry: &ChannelRegistry, capacity: usize) -> Result<Self> {
        let mut histories = BTreeMap::new();
        for channel in registry.chartable_channels() {
            histories.insert(
                channel.key.clone(),
                HistoryBuffer::new(channel.key.clone(), capacity)?,
            );
        }
        Ok(Self {
            latest: LatestValueStore::new(),
            histories,
            version: 0,
        })
    }

    /// Store a sample: overwrite the latest value and, for chart channels,
    /// append to history
    ///
    /// The history append is validated before the latest value is touched,
    /// so a failure leaves the store unchanged.
    pub fn record(&mut self, key: &str, sample: Sample) -> Result<()> {
        if let Some(history) = self.histories.get_mut(key) {
            history.append(sample.clone())?;
        }
        self.latest.set(key, sample);
        self.version += 1;
        Ok(())
    }

    /// Empty every history buffer and forget every latest value
    pub fn clear_all(&mut self) {
        for history in self.histories.values_mut() {
            history.clear();
        }
        self.latest.clear();
        self.version += 1;
    }

    pub fn latest(&self, key: &str) -> Option<&Sample> {
        self.latest.get(key)
    }

    pub fn history(&self, key: &str) -> Option<&HistoryBuffer> {
        self.histories.get(key)
    }

    /// Snapshot of one channel's history
    pub fn history_snapshot(&self, key: &str) -> Result<Vec<Sample>> {
        self.histories
            .get(key)
            .map(HistoryBuffer::snapshot)
            .ok_or_else(|| EnvDashError::Channel(format!("'{}' has no chart history", key)))
    }

    /// Snapshot of every chart history
    pub fn chart_snapshots(&self) -> BTreeMap<String, Vec<Sample>> {
        self.histories
            .iter()
            .map(|(key, history)| (key.clone(), history.snapshot()))
            .collect()
    }

    /// Iterate over all history buffers
    pub fn histories(&self) -> impl Iterator<Item = &HistoryBuffer> {
        self.histories.values()
    }

    /// Version counter bumped on every mutation
    pub fn version(&self) -> u64 {
        self.version
    }
}
