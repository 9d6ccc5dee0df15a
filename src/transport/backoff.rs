//! Reconnect backoff
//!
//! Exponential backoff with jitter. Jitter only ever shortens the nominal
//! delay, and each delay is at least the previous one, so the sequence is
//! non-decreasing and never exceeds the cap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default first retry delay in milliseconds
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2_000;

/// Default upper bound for retry delays in milliseconds
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 60_000;

/// Backoff tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// First delay in milliseconds
    pub base_ms: u64,
    /// Largest delay in milliseconds
    pub cap_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Fraction of the nominal delay that may be shaved off at random (0..=1)
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BACKOFF_BASE_MS,
            cap_ms: DEFAULT_BACKOFF_CAP_MS,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms.min(self.cap_ms))
    }

    pub fn cap(&self) -> Duration {
        Duration::from_millis(self.cap_ms)
    }

    /// Delay before jitter for the given zero-based attempt
    fn nominal_secs(&self, attempt: u32) -> f64 {
        let base = self.base().as_secs_f64();
        let cap = self.cap().as_secs_f64();
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let grown = base * multiplier.powi(attempt.min(64) as i32);
        if grown.is_finite() {
            grown.min(cap)
        } else {
            cap
        }
    }
}

/// Stateful delay sequence for one connection session
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
    last: Duration,
    rng: StdRng,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    /// Reproducible jitter, for tests
    pub fn with_seed(policy: BackoffPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: BackoffPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            attempt: 0,
            last: Duration::ZERO,
            rng,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.policy.nominal_secs(self.attempt);
        let jitter = self.policy.jitter.clamp(0.0, 1.0);
        let factor = 1.0 - jitter * self.rng.gen::<f64>();
        let candidate = Duration::from_secs_f64(nominal * factor);

        let delay = candidate.max(self.last).min(self.policy.cap());
        self.last = delay;
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last = Duration::ZERO;
    }

    /// Attempts made since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
