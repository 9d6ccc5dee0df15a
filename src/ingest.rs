//! Ingest dispatcher
//!
//! Turns a raw `(topic, payload)` pair into a typed [`Sample`] and routes it to
//! the right stores. The dispatcher is fully synchronous and owns the
//! [`SensorStore`]; it is only ever driven from the dashboard's apply step, so
//! no locking is involved.
//!
//! # Algorithm
//!
//! 1. Resolve the topic through the [`ChannelRegistry`]; unknown topics yield
//!    [`IngestResult::Unmapped`].
//! 2. Coerce the payload to the channel's kind (trimmed float for numeric
//!    channels, trimmed text for text channels, verbatim for opaque ones).
//! 3. Stamp the sample with the current time and store it: chart history
//!    first (so a rejection cannot leave a partial update), then the latest
//!    value slot.
//!
//! Malformed payloads produce [`IngestResult::Rejected`] and leave the stores
//! exactly as they were.

use crate::error::Result;
use crate::registry::{Channel, ChannelKind, ChannelRegistry};
use crate::store::SensorStore;
use crate::types::{IngestResult, IngestStats, RejectReason, Sample, SampleValue};
use std::sync::Arc;

/// Coerce a raw payload into the value type a channel expects
pub fn coerce_payload(
    channel: &Channel,
    raw_payload: &str,
) -> std::result::Result<SampleValue, RejectReason> {
    match channel.kind {
        ChannelKind::Numeric => {
            let trimmed = raw_payload.trim();
            if trimmed.is_empty() {
                return Err(RejectReason::EmptyPayload);
            }
            let value: f64 = trimmed
                .parse()
                .map_err(|_| RejectReason::NotANumber(trimmed.to_string()))?;
            if !value.is_finite() {
                return Err(RejectReason::NonFinite(trimmed.to_string()));
            }
            Ok(SampleValue::Number(value))
        }
        ChannelKind::Text => {
            let trimmed = raw_payload.trim();
            if trimmed.is_empty() {
                return Err(RejectReason::EmptyPayload);
            }
            Ok(SampleValue::Text(trimmed.to_string()))
        }
        ChannelKind::Opaque => {
            if raw_payload.is_empty() {
                return Err(RejectReason::EmptyPayload);
            }
            Ok(SampleValue::Opaque(Arc::from(raw_payload)))
        }
    }
}

/// Routes raw messages to the sensor stores
#[derive(Debug)]
pub struct IngestDispatcher {
    registry: Arc<ChannelRegistry>,
    store: SensorStore,
    stats: IngestStats,
}

impl IngestDispatcher {
    /// Create a dispatcher with a fresh store of the given history capacity
    pub fn new(registry: Arc<ChannelRegistry>, history_capacity: usize) -> Result<Self> {
        let store = SensorStore::new(&registry, history_capacity)?;
        Ok(Self {
            registry,
            store,
            stats: IngestStats::default(),
        })
    }

    /// Feed one raw message through the pipeline
    pub fn ingest(&mut self, wire_topic: &str, raw_payload: &str) -> IngestResult {
        let Some(channel) = self.registry.resolve(wire_topic) else {
            self.stats.unmapped += 1;
            tracing::trace!("Ignoring message on unmapped topic '{}'", wire_topic);
            return IngestResult::Unmapped;
        };

        let value = match coerce_payload(channel, raw_payload) {
            Ok(value) => value,
            Err(reason) => {
                self.stats.rejected += 1;
                tracing::debug!("Rejected payload for '{}': {}", channel.key, reason);
                return IngestResult::Rejected {
                    key: channel.key.clone(),
                    reason,
                };
            }
        };

        let key = channel.key.clone();
        self.apply(key, value)
    }

    /// Store an already-typed value for a channel key
    ///
    /// Used by the synthetic generator, which produces typed values directly.
    pub fn ingest_value(&mut self, key: &str, value: SampleValue) -> IngestResult {
        let Some(channel) = self.registry.get(key) else {
            self.stats.unmapped += 1;
            return IngestResult::Unmapped;
        };
        let fits = matches!(
            (channel.kind, &value),
            (ChannelKind::Numeric, SampleValue::Number(_))
                | (ChannelKind::Text, SampleValue::Text(_))
                | (ChannelKind::Opaque, SampleValue::Opaque(_))
        );
        if !fits {
            self.stats.rejected += 1;
            return IngestResult::Rejected {
                key: key.to_string(),
                reason: RejectReason::KindMismatch {
                    expected: channel.kind,
                    found: value.to_string(),
                },
            };
        }
        self.apply(key.to_string(), value)
    }

    fn apply(&mut self, key: String, value: SampleValue) -> IngestResult {
        let sample = Sample::now(value.clone());
        match self.store.record(&key, sample) {
            Ok(()) => {
                self.stats.applied += 1;
                IngestResult::Applied { key, value }
            }
            Err(e) => {
                // Registry validation keeps chart channels numeric, so this only
                // triggers for hand-built stores.
                self.stats.rejected += 1;
                tracing::warn!("Failed to store sample for '{}': {}", key, e);
                IngestResult::Rejected {
                    key,
                    reason: RejectReason::KindMismatch {
                        expected: ChannelKind::Numeric,
                        found: value.to_string(),
                    },
                }
            }
        }
    }

    /// Clear every buffer and latest value
    pub fn clear(&mut self) {
        self.store.clear_all();
    }

    pub fn store(&self) -> &SensorStore {
        &self.store
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Mutable access to the counters for the apply step's drop accounting
    pub(crate) fn stats_mut(&mut self) -> &mut IngestStats {
        &mut self.stats
    }
}
