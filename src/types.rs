//! Core data types for envdash-rs
//!
//! This module contains the data structures shared by every stage of the
//! ingestion core: samples, the two state enums, ingest outcomes and the
//! snapshot handed to the presentation layer.
//!
//! # Main Types
//!
//! - [`Sample`] / [`SampleValue`] - One timestamped observation
//! - [`ModeState`] - Whether live broker data or synthetic data is shown
//! - [`ConnectionState`] - Transport connection lifecycle
//! - [`IngestResult`] - Outcome of feeding one message to the dispatcher
//! - [`DashboardSnapshot`] - Renderable view of latest values and chart series

use crate::registry::ChannelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The value carried by a [`Sample`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Numeric reading (temperature, humidity, AQI, ...)
    Number(f64),
    /// Textual reading such as a UV risk level
    Text(String),
    /// Opaque payload reference (camera frames); never charted
    Opaque(Arc<str>),
}

impl SampleValue {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SampleValue::Number(_))
    }
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleValue::Number(v) => write!(f, "{}", v),
            SampleValue::Text(s) => write!(f, "{}", s),
            SampleValue::Opaque(s) => write!(f, "<{} bytes>", s.len()),
        }
    }
}

/// A single observation of one channel
///
/// Samples are immutable once created; stores hand out clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Wall-clock instant of arrival
    timestamp: DateTime<Utc>,
    /// The coerced value
    value: SampleValue,
}

impl Sample {
    /// Create a sample stamped with the current time
    pub fn now(value: SampleValue) -> Self {
        Self::at(Utc::now(), value)
    }

    /// Create a sample with an explicit timestamp
    pub fn at(timestamp: DateTime<Utc>, value: SampleValue) -> Self {
        Self { timestamp, value }
    }

    /// Convenience constructor for numeric samples stamped now
    pub fn number(value: f64) -> Self {
        Self::now(SampleValue::Number(value))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> &SampleValue {
        &self.value
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// Which data source currently feeds the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    /// Broker messages are applied
    Live,
    /// The synthetic generator feeds the stores
    Simulated,
}

impl ModeState {
    /// The other mode
    pub fn flipped(self) -> Self {
        match self {
            ModeState::Live => ModeState::Simulated,
            ModeState::Simulated => ModeState::Live,
        }
    }
}

impl std::fmt::Display for ModeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeState::Live => write!(f, "Live"),
            ModeState::Simulated => write!(f, "Simulated"),
        }
    }
}

/// Represents the connection status to the message broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected, no attempt in progress
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Broker acknowledged the session
    Connected,
    /// An established session dropped; waiting out the backoff delay
    Reconnecting,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal lifecycle step
    ///
    /// Any state may move to `Disconnected` (deliberate stop or failed
    /// attempt). `Connecting -> Reconnecting` covers a failed retry after a
    /// session had already been established.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting, Reconnecting) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting..."),
        }
    }
}

/// Where an ingest call originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestSource {
    /// A broker message delivered by the transport
    Transport,
    /// The synthetic generator
    Synthetic,
    /// Peripheral services (weather, advice) injected by the host
    External,
}

impl IngestSource {
    /// Whether samples from this source may be applied in `mode`
    pub fn allowed_in(self, mode: ModeState) -> bool {
        match self {
            IngestSource::Transport => mode == ModeState::Live,
            IngestSource::Synthetic => mode == ModeState::Simulated,
            IngestSource::External => true,
        }
    }
}

/// Why a payload was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Payload could not be parsed as a number
    NotANumber(String),
    /// Payload parsed to NaN or infinity
    NonFinite(String),
    /// Payload was empty after trimming
    EmptyPayload,
    /// Typed value does not match the channel's kind
    KindMismatch { expected: ChannelKind, found: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotANumber(raw) => write!(f, "not a number: {:?}", raw),
            RejectReason::NonFinite(raw) => write!(f, "non-finite value: {:?}", raw),
            RejectReason::EmptyPayload => write!(f, "empty payload"),
            RejectReason::KindMismatch { expected, found } => {
                write!(f, "expected a {:?} value, got {:?}", expected, found)
            }
        }
    }
}

/// Outcome of a single ingest call
#[derive(Debug, Clone, PartialEq)]
pub enum IngestResult {
    /// Sample stored under `key`
    Applied { key: String, value: SampleValue },
    /// Payload malformed for the channel; stores unchanged
    Rejected { key: String, reason: RejectReason },
    /// No channel is bound to the topic
    Unmapped,
}

impl IngestResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, IngestResult::Applied { .. })
    }
}

/// Counters kept by the dispatcher and the apply step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Samples stored
    pub applied: u64,
    /// Payloads rejected as malformed
    pub rejected: u64,
    /// Messages on topics with no channel
    pub unmapped: u64,
    /// Messages dropped because their source does not match the mode
    pub dropped_wrong_mode: u64,
    /// Events discarded because they belonged to an earlier transport session
    pub dropped_stale: u64,
    /// Events lost because the transport queue was full
    pub dropped_queue_full: u64,
}

impl IngestStats {
    /// Fraction of resolved messages that were applied, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.applied + self.rejected;
        if total == 0 {
            100.0
        } else {
            (self.applied as f64 / total as f64) * 100.0
        }
    }
}

/// Renderable view of the dashboard state
///
/// Two snapshots taken without any intervening ingest compare equal, so the
/// presentation layer can skip redundant redraws with `==`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Current data source
    pub mode: ModeState,
    /// Current broker connection state
    pub connection: ConnectionState,
    /// Store version the latest values were read at
    pub data_version: u64,
    /// Store version the chart series were read at
    pub chart_version: u64,
    /// Latest value per channel key (`None` = no data yet)
    pub values: BTreeMap<String, Option<Sample>>,
    /// Ordered history per chartable channel key
    pub charts: BTreeMap<String, Vec<Sample>>,
}

impl DashboardSnapshot {
    /// Latest value for a channel, if any has arrived
    pub fn value(&self, key: &str) -> Option<&SampleValue> {
        self.values.get(key)?.as_ref().map(Sample::value)
    }

    /// Chart series for a channel
    pub fn chart(&self, key: &str) -> Option<&[Sample]> {
        self.charts.get(key).map(Vec::as_slice)
    }

    /// Chart series as plot points (seconds since the first sample, value)
    pub fn plot_points(&self, key: &str) -> Vec<[f64; 2]> {
        let Some(series) = self.charts.get(key) else {
            return Vec::new();
        };
        let Some(first) = series.first() else {
            return Vec::new();
        };
        let origin = first.timestamp();
        series
            .iter()
            .filter_map(|s| {
                let t = (s.timestamp() - origin).num_milliseconds() as f64 / 1000.0;
                s.as_f64().map(|v| [t, v])
            })
            .collect()
    }

    /// Whether the UI should show a "simulated data" indicator
    pub fn is_simulated(&self) -> bool {
        self.mode == ModeState::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_connection_state_transitions() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Connected.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Reconnecting));
        assert!(!Reconnecting.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
    }

    #[test]
    fn test_ingest_source_gating() {
        assert!(IngestSource::Transport.allowed_in(ModeState::Live));
        assert!(!IngestSource::Transport.allowed_in(ModeState::Simulated));
        assert!(IngestSource::Synthetic.allowed_in(ModeState::Simulated));
        assert!(!IngestSource::Synthetic.allowed_in(ModeState::Live));
        assert!(IngestSource::External.allowed_in(ModeState::Live));
        assert!(IngestSource::External.allowed_in(ModeState::Simulated));
    }

    #[test]
    fn test_mode_flip() {
        assert_eq!(ModeState::Live.flipped(), ModeState::Simulated);
        assert_eq!(ModeState::Simulated.flipped(), ModeState::Live);
    }

    #[test]
    fn test_sample_value_serializes_untagged() {
        let json = serde_json::to_string(&SampleValue::Number(21.5)).unwrap();
        assert_eq!(json, "21.5");
        let json = serde_json::to_string(&SampleValue::Text("高".into())).unwrap();
        assert_eq!(json, "\"高\"");
    }

    #[test]
    fn test_snapshot_plot_points() {
        let t0 = Utc::now();
        let mut charts = BTreeMap::new();
        charts.insert(
            "temp".to_string(),
            vec![
                Sample::at(t0, SampleValue::Number(20.0)),
                Sample::at(t0 + Duration::milliseconds(1500), SampleValue::Number(21.0)),
            ],
        );
        let snapshot = DashboardSnapshot {
            mode: ModeState::Live,
            connection: ConnectionState::Connected,
            data_version: 2,
            chart_version: 2,
            values: BTreeMap::new(),
            charts,
        };

        let points = snapshot.plot_points("temp");
        assert_eq!(points, vec![[0.0, 20.0], [1.5, 21.0]]);
        assert!(snapshot.plot_points("humi").is_empty());
        assert!(!snapshot.is_simulated());
    }

    #[test]
    fn test_ingest_stats_success_rate() {
        let mut stats = IngestStats::default();
        assert_eq!(stats.success_rate(), 100.0);
        stats.applied = 3;
        stats.rejected = 1;
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }
}
