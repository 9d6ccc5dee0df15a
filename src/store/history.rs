//! Bounded per-channel sample history
//!
//! A [`HistoryBuffer`] is a ring buffer of numeric samples. When it is full
//! the oldest sample is evicted, so the buffer always holds the most recent
//! `capacity` samples in arrival order.

use crate::error::{EnvDashError, Result};
use crate::types::Sample;
use std::collections::VecDeque;

/// Fixed-capacity, arrival-ordered sample history for one chart channel
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    /// Channel key, used in error messages
    key: String,
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl HistoryBuffer {
    /// Create an empty buffer; a capacity of zero is a configuration error
    pub fn new(key: impl Into<String>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EnvDashError::BufferCapacityMisconfigured(capacity));
        }
        Ok(Self {
            key: key.into(),
            capacity,
            samples: VecDeque::with_capacity(capacity),
        })
    }

    /// Append a sample, evicting the oldest one when full
    ///
    /// Only numeric samples are accepted; anything else is rejected and the
    /// buffer is left untouched so the caller can decide what to do.
    pub fn append(&mut self, sample: Sample) -> Result<()> {
        if !sample.value().is_numeric() {
            return Err(EnvDashError::NonNumericSample(self.key.clone()));
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        Ok(())
    }

    /// Owned copy of the samples, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Remove every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Numeric values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().filter_map(Sample::as_f64).collect()
    }

    /// (min, max) over the buffered values, for chart axis scaling
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut values = self.samples.iter().filter_map(Sample::as_f64);
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}
