//! Latest value per channel

use crate::types::Sample;
use std::collections::HashMap;

/// Most recent sample per channel key
///
/// A missing entry is the "no data yet" marker.
#[derive(Debug, Clone, Default)]
pub struct LatestValueStore {
    values: HashMap<String, Sample>,
}

impl LatestValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the latest sample for `key`
    pub fn set(&mut self, key: &str, sample: Sample) {
        match self.values.get_mut(key) {
            Some(slot) => *slot = sample,
            None => {
                self.values.insert(key.to_string(), sample);
            }
        }
    }

    /// Latest sample for `key`, or `None` if nothing has arrived yet
    pub fn get(&self, key: &str) -> Option<&Sample> {
        self.values.get(key)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of channels that have data
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_not_append() {
        let mut store = LatestValueStore::new();
        assert!(store.get("temp").is_none());

        store.set("temp", Sample::number(20.0));
        store.set("temp", Sample::number(21.0));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("temp").and_then(Sample::as_f64), Some(21.0));
    }

    #[test]
    fn test_clear() {
        let mut store = LatestValueStore::new();
        store.set("temp", Sample::number(20.0));
        store.set("humi", Sample::number(50.0));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("humi").is_none());
    }
}
