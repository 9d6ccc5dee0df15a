//! Channel registry
//!
//! The registry is the single place where wire topics are mapped to logical
//! sensor channels. It is built once at startup, validated, and never mutated
//! afterwards; every other component looks channels up through it.

use crate::error::{EnvDashError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of payload a channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Parsed as a float
    #[default]
    Numeric,
    /// Kept as trimmed text (e.g. UV risk level)
    Text,
    /// Kept verbatim as an opaque reference (camera frames)
    Opaque,
}

/// How the synthetic generator produces values for a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimProfile {
    /// Bounded random walk clamped to `[min, max]`
    Walk {
        min: f64,
        max: f64,
        /// Largest perturbation applied per tick
        step: f64,
        /// Starting value
        initial: f64,
    },
    /// Random pick from a fixed set of labels
    Choice { options: Vec<String> },
    /// UV risk label derived from another channel's simulated UV index
    UvRisk { source: String },
}

impl SimProfile {
    fn validate(&self, key: &str) -> Result<()> {
        let invalid = |message: String| EnvDashError::InvalidChannel {
            key: key.to_string(),
            message,
        };
        match self {
            SimProfile::Walk {
                min,
                max,
                step,
                initial,
            } => {
                if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                    return Err(invalid("simulation range must be finite".into()));
                }
                if min > max {
                    return Err(invalid(format!("simulation min {} exceeds max {}", min, max)));
                }
                if *step < 0.0 {
                    return Err(invalid("simulation step must not be negative".into()));
                }
                if !(min..=max).contains(&initial) {
                    return Err(invalid(format!(
                        "simulation initial value {} outside [{}, {}]",
                        initial, min, max
                    )));
                }
            }
            SimProfile::Choice { options } => {
                if options.is_empty() {
                    return Err(invalid("simulation choice list is empty".into()));
                }
            }
            SimProfile::UvRisk { .. } => {}
        }
        Ok(())
    }
}

/// One sensor metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Stable logical identifier (e.g. "temp")
    pub key: String,
    /// Broker topic bound to this channel
    pub wire_topic: String,
    /// Display unit, passed through untouched
    #[serde(default)]
    pub unit: String,
    /// Whether samples accumulate in a chart history
    #[serde(default)]
    pub chartable: bool,
    /// Payload kind
    #[serde(default)]
    pub kind: ChannelKind,
    /// Synthetic data profile (`None` = not simulated)
    #[serde(default)]
    pub simulation: Option<SimProfile>,
    /// Fed by a host-side service (weather, advice) rather than a campus sensor
    #[serde(default)]
    pub external: bool,
}

impl Channel {
    /// Create a numeric, chartable channel
    pub fn numeric(key: impl Into<String>, wire_topic: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            wire_topic: wire_topic.into(),
            unit: String::new(),
            chartable: true,
            kind: ChannelKind::Numeric,
            simulation: None,
            external: false,
        }
    }

    /// Create a non-chartable text channel
    pub fn text(key: impl Into<String>, wire_topic: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            wire_topic: wire_topic.into(),
            unit: String::new(),
            chartable: false,
            kind: ChannelKind::Text,
            simulation: None,
            external: false,
        }
    }

    /// Create a non-chartable opaque channel
    pub fn opaque(key: impl Into<String>, wire_topic: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Opaque,
            ..Self::text(key, wire_topic)
        }
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set whether the channel keeps chart history
    pub fn with_chartable(mut self, chartable: bool) -> Self {
        self.chartable = chartable;
        self
    }

    /// Attach a bounded random-walk simulation profile
    pub fn with_walk(mut self, min: f64, max: f64, step: f64, initial: f64) -> Self {
        self.simulation = Some(SimProfile::Walk {
            min,
            max,
            step,
            initial,
        });
        self
    }

    /// Attach a simulation profile
    pub fn with_simulation(mut self, profile: SimProfile) -> Self {
        self.simulation = Some(profile);
        self
    }

    /// Mark the channel as fed by a host-side service
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(EnvDashError::InvalidChannel {
                key: self.key.clone(),
                message: "key must not be empty".into(),
            });
        }
        if self.wire_topic.trim().is_empty() {
            return Err(EnvDashError::InvalidChannel {
                key: self.key.clone(),
                message: "wire topic must not be empty".into(),
            });
        }
        if self.chartable && self.kind != ChannelKind::Numeric {
            return Err(EnvDashError::InvalidChannel {
                key: self.key.clone(),
                message: format!("{:?} channels cannot be charted", self.kind),
            });
        }
        if let Some(profile) = &self.simulation {
            let compatible = matches!(
                (self.kind, profile),
                (ChannelKind::Numeric, SimProfile::Walk { .. })
                    | (ChannelKind::Text, SimProfile::Choice { .. })
                    | (ChannelKind::Text, SimProfile::UvRisk { .. })
            );
            if !compatible {
                return Err(EnvDashError::InvalidChannel {
                    key: self.key.clone(),
                    message: format!("simulation profile does not fit a {:?} channel", self.kind),
                });
            }
            profile.validate(&self.key)?;
        }
        Ok(())
    }
}

/// Static mapping from wire topics to channels
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    by_topic: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
}

impl ChannelRegistry {
    /// Build a registry, failing fast on any inconsistent definition
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        let mut by_topic = HashMap::with_capacity(channels.len());
        let mut by_key = HashMap::with_capacity(channels.len());

        for (index, channel) in channels.iter().enumerate() {
            channel.validate()?;

            if let Some(&existing) = by_topic.get(&channel.wire_topic) {
                let first: &Channel = &channels[existing];
                return Err(EnvDashError::DuplicateTopicMapping {
                    topic: channel.wire_topic.clone(),
                    first: first.key.clone(),
                    second: channel.key.clone(),
                });
            }
            if by_key.contains_key(&channel.key) {
                return Err(EnvDashError::DuplicateChannelKey(channel.key.clone()));
            }

            by_topic.insert(channel.wire_topic.clone(), index);
            by_key.insert(channel.key.clone(), index);
        }

        for channel in &channels {
            if let Some(SimProfile::UvRisk { source }) = &channel.simulation {
                let source_ok = by_key
                    .get(source)
                    .map(|&i| channels[i].kind == ChannelKind::Numeric)
                    .unwrap_or(false);
                if !source_ok {
                    return Err(EnvDashError::InvalidChannel {
                        key: channel.key.clone(),
                        message: format!("UV risk source '{}' is not a numeric channel", source),
                    });
                }
            }
        }

        Ok(Self {
            channels,
            by_topic,
            by_key,
        })
    }

    /// The campus sensor table used when no configuration overrides it
    pub fn campus_default() -> Result<Self> {
        Self::new(default_channels())
    }

    /// Look up the channel bound to a wire topic
    pub fn resolve(&self, wire_topic: &str) -> Option<&Channel> {
        self.by_topic.get(wire_topic).map(|&i| &self.channels[i])
    }

    /// Look up a channel by its logical key
    pub fn get(&self, key: &str) -> Option<&Channel> {
        self.by_key.get(key).map(|&i| &self.channels[i])
    }

    /// All channels in definition order
    pub fn all_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Channels that keep chart history
    pub fn chartable_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.chartable)
    }

    /// Every wire topic, for broker subscription
    pub fn topics(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.wire_topic.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Campus sensor channels as published by the sensor hub
pub fn default_channels() -> Vec<Channel> {
    vec![
        Channel::numeric("temp", "siot/环境温度")
            .with_unit("°C")
            .with_walk(-10.0, 45.0, 0.5, 22.0),
        Channel::numeric("humi", "siot/环境湿度")
            .with_unit("%")
            .with_walk(0.0, 100.0, 1.5, 55.0),
        Channel::numeric("aqi", "siot/aqi").with_walk(0.0, 500.0, 5.0, 50.0),
        Channel::numeric("tvoc", "siot/tvoc")
            .with_unit("ppb")
            .with_walk(0.0, 1000.0, 20.0, 150.0),
        Channel::numeric("eco2", "siot/eco2")
            .with_unit("ppm")
            .with_walk(400.0, 2000.0, 25.0, 600.0),
        Channel::numeric("uv", "siot/紫外线指数").with_walk(0.0, 11.0, 0.3, 3.0),
        Channel::text("uv_risk", "siot/紫外线风险等级").with_simulation(SimProfile::UvRisk {
            source: "uv".to_string(),
        }),
        Channel::numeric("noise", "siot/噪音")
            .with_unit("dB")
            .with_walk(30.0, 100.0, 2.0, 45.0),
        Channel::opaque("camera", "siot/摄像头"),
        Channel::numeric("weather_temp", "weather/室外温度")
            .with_unit("°C")
            .with_chartable(false)
            .external(),
        Channel::text("advice", "ai/环境建议").external(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campus_default_is_valid() {
        let channels = default_channels();
        let count = channels.len();
        let registry = ChannelRegistry::new(channels).unwrap();
        assert_eq!(registry.len(), count);
        assert_eq!(ChannelRegistry::campus_default().unwrap().len(), count);
    }

    #[test]
    fn test_resolve_by_topic_and_key() {
        let registry = ChannelRegistry::campus_default().unwrap();

        let temp = registry.resolve("siot/环境温度").unwrap();
        assert_eq!(temp.key, "temp");
        assert_eq!(temp.unit, "°C");
        assert!(temp.chartable);

        assert_eq!(registry.get("uv_risk").unwrap().kind, ChannelKind::Text);
        assert!(registry.resolve("unknown/topic").is_none());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_duplicate_topic_fails_fast() {
        let err = ChannelRegistry::new(vec![
            Channel::numeric("temp", "siot/t"),
            Channel::numeric("temp2", "siot/t"),
        ])
        .unwrap_err();
        assert!(matches!(err, EnvDashError::DuplicateTopicMapping { .. }));
    }

    #[test]
    fn test_duplicate_key_fails_fast() {
        let err = ChannelRegistry::new(vec![
            Channel::numeric("temp", "siot/a"),
            Channel::numeric("temp", "siot/b"),
        ])
        .unwrap_err();
        assert!(matches!(err, EnvDashError::DuplicateChannelKey(_)));
    }

    #[test]
    fn test_chartable_text_channel_rejected() {
        let err = ChannelRegistry::new(vec![Channel::text("risk", "siot/r").with_chartable(true)])
            .unwrap_err();
        assert!(matches!(err, EnvDashError::InvalidChannel { .. }));
    }

    #[test]
    fn test_bad_simulation_profiles_rejected() {
        let inverted = Channel::numeric("t", "siot/t").with_walk(10.0, 0.0, 1.0, 5.0);
        assert!(ChannelRegistry::new(vec![inverted]).is_err());

        let out_of_range = Channel::numeric("t", "siot/t").with_walk(0.0, 10.0, 1.0, 50.0);
        assert!(ChannelRegistry::new(vec![out_of_range]).is_err());

        let dangling = Channel::text("risk", "siot/r").with_simulation(SimProfile::UvRisk {
            source: "uv".into(),
        });
        assert!(ChannelRegistry::new(vec![dangling]).is_err());

        let mismatched = Channel::numeric("t", "siot/t").with_simulation(SimProfile::Choice {
            options: vec!["a".into()],
        });
        assert!(ChannelRegistry::new(vec![mismatched]).is_err());
    }

    #[test]
    fn test_topics_and_chartable_channels() {
        let registry = ChannelRegistry::campus_default().unwrap();
        let topics = registry.topics();
        assert_eq!(topics.len(), registry.len());
        assert!(topics.contains(&"siot/噪音".to_string()));

        assert!(registry.chartable_channels().all(|c| c.kind == ChannelKind::Numeric));
        assert!(!registry.chartable_channels().any(|c| c.key == "camera"));
    }

    #[test]
    fn test_only_service_channels_are_external() {
        let registry = ChannelRegistry::campus_default().unwrap();
        let external: Vec<&str> = registry
            .all_channels()
            .filter(|c| c.external)
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(external, vec!["weather_temp", "advice"]);
        assert!(!registry.get("temp").unwrap().external);
    }
}
