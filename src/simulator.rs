//! Synthetic sensor data
//!
//! In simulated mode the dashboard is fed by a [`SyntheticGenerator`] instead
//! of the broker. Each tick produces one value per simulated channel:
//!
//! - [`SimProfile::Walk`] - bounded random walk: the previous value plus a
//!   uniform perturbation in `[-step, step]`, clamped to `[min, max]`
//! - [`SimProfile::Choice`] - uniform pick from a label set
//! - [`SimProfile::UvRisk`] - risk label derived from the simulated UV index
//!
//! Values never leave their configured range, which keeps chart axes stable.

use crate::registry::{ChannelRegistry, SimProfile};
use crate::types::SampleValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Default interval between synthetic ticks in milliseconds
pub const DEFAULT_SIM_TICK_MS: u64 = 3000;

/// Map a UV index onto the risk label published by the sensor hub
pub fn uv_risk_label(uv_index: f64) -> &'static str {
    if uv_index < 3.0 {
        "低"
    } else if uv_index < 6.0 {
        "中等"
    } else if uv_index < 8.0 {
        "高"
    } else if uv_index < 11.0 {
        "很高"
    } else {
        "极高"
    }
}

#[derive(Debug, Clone)]
struct Walker {
    key: String,
    min: f64,
    max: f64,
    step: f64,
    initial: f64,
    current: f64,
}

impl Walker {
    fn advance(&mut self, rng: &mut StdRng) -> f64 {
        let delta = if self.step > 0.0 {
            rng.gen_range(-self.step..=self.step)
        } else {
            0.0
        };
        self.current = (self.current + delta).clamp(self.min, self.max);
        self.current
    }
}

/// Produces synthetic samples for every channel with a simulation profile
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng: StdRng,
    walkers: Vec<Walker>,
    choices: Vec<(String, Vec<String>)>,
    /// (target key, source key)
    derived: Vec<(String, String)>,
}

impl SyntheticGenerator {
    /// Build a generator for the registry's simulated channels
    ///
    /// A fixed `seed` makes the sequence reproducible.
    pub fn new(registry: &ChannelRegistry, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut walkers = Vec::new();
        let mut choices = Vec::new();
        let mut derived = Vec::new();

        for channel in registry.all_channels() {
            match &channel.simulation {
                Some(SimProfile::Walk {
                    min,
                    max,
                    step,
                    initial,
                }) => walkers.push(Walker {
                    key: channel.key.clone(),
                    min: *min,
                    max: *max,
                    step: *step,
                    initial: *initial,
                    current: *initial,
                }),
                Some(SimProfile::Choice { options }) => {
                    choices.push((channel.key.clone(), options.clone()));
                }
                Some(SimProfile::UvRisk { source }) => {
                    derived.push((channel.key.clone(), source.clone()));
                }
                None => {}
            }
        }

        Self {
            rng,
            walkers,
            choices,
            derived,
        }
    }

    /// Restart every walk from its initial value
    pub fn reset(&mut self) {
        for walker in &mut self.walkers {
            walker.current = walker.initial;
        }
    }

    /// Number of channels this generator feeds
    pub fn channel_count(&self) -> usize {
        self.walkers.len() + self.choices.len() + self.derived.len()
    }

    /// Produce one value per simulated channel
    pub fn generate(&mut self) -> Vec<(String, SampleValue)> {
        let mut out = Vec::with_capacity(self.channel_count());
        let mut numeric = HashMap::with_capacity(self.walkers.len());

        for walker in &mut self.walkers {
            let value = walker.advance(&mut self.rng);
            numeric.insert(walker.key.as_str(), value);
            out.push((walker.key.clone(), SampleValue::Number(value)));
        }

        for (key, source) in &self.derived {
            if let Some(&uv) = numeric.get(source.as_str()) {
                out.push((key.clone(), SampleValue::Text(uv_risk_label(uv).to_string())));
            }
        }

        for (key, options) in &self.choices {
            let index = self.rng.gen_range(0..options.len());
            out.push((key.clone(), SampleValue::Text(options[index].clone())));
        }

        out
    }
}
