//! Live/simulated mode state machine
//!
//! [`ModeController`] decides whether the dashboard shows broker data or
//! synthetic data. It only tracks state and notifies listeners; the side
//! effects of a transition (stopping or starting the transport, clearing the
//! stores, starting the generator) are carried out by the dashboard's apply
//! step right after the controller reports a [`ModeChange`].
//!
//! # Transitions
//!
//! - `toggle()` flips the mode (user action).
//! - `record_connect_failure()` counts consecutive connect failures while
//!   live and falls back to simulated once the threshold is reached.
//! - `transport_unavailable()` falls back at once when the transport cannot
//!   even be started, since no further attempts would follow.
//!
//! Simulated never switches back to live on its own, so a flaky broker cannot
//! make the dashboard flap between modes.

use crate::types::ModeState;

/// Default number of consecutive connect failures before falling back
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Why a mode transition happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeChangeCause {
    /// Explicit toggle from the presentation layer
    UserToggle,
    /// Automatic fallback after repeated connect failures
    ConnectFailures {
        /// Consecutive failures observed
        attempts: u32,
        /// Reason reported by the last failed attempt
        last_reason: String,
    },
    /// Automatic fallback because the transport could not be started
    TransportUnavailable { reason: String },
}

/// A completed mode transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub from: ModeState,
    pub to: ModeState,
    pub cause: ModeChangeCause,
}

impl ModeChange {
    /// Whether the change was triggered automatically
    pub fn is_automatic(&self) -> bool {
        !matches!(self.cause, ModeChangeCause::UserToggle)
    }
}

type ModeListener = Box<dyn FnMut(&ModeChange) + Send>;

/// Two-state machine governing the dashboard's data source
pub struct ModeController {
    state: ModeState,
    failure_threshold: u32,
    consecutive_failures: u32,
    listeners: Vec<ModeListener>,
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("state", &self.state)
            .field("failure_threshold", &self.failure_threshold)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ModeController {
    /// Create a controller; starts live only when a broker endpoint exists
    pub fn new(endpoint_configured: bool, failure_threshold: u32) -> Self {
        let state = if endpoint_configured {
            ModeState::Live
        } else {
            ModeState::Simulated
        };
        Self {
            state,
            failure_threshold: failure_threshold.max(1),
            consecutive_failures: 0,
            listeners: Vec::new(),
        }
    }

    /// Current mode
    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Register a callback fired once per transition
    pub fn on_mode_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&ModeChange) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Flip the mode (explicit user action)
    pub fn toggle(&mut self) -> ModeChange {
        let to = self.state.flipped();
        self.transition(to, ModeChangeCause::UserToggle)
    }

    /// Record a failed connect attempt
    ///
    /// Returns the fallback transition when this failure reaches the
    /// threshold while live. Failures while simulated are ignored.
    pub fn record_connect_failure(&mut self, reason: &str) -> Option<ModeChange> {
        if self.state != ModeState::Live {
            return None;
        }

        self.consecutive_failures += 1;
        tracing::warn!(
            "Connect failure {}/{}: {}",
            self.consecutive_failures,
            self.failure_threshold,
            reason
        );

        if self.consecutive_failures < self.failure_threshold {
            return None;
        }

        let cause = ModeChangeCause::ConnectFailures {
            attempts: self.consecutive_failures,
            last_reason: reason.to_string(),
        };
        Some(self.transition(ModeState::Simulated, cause))
    }

    /// Fall back immediately because the transport failed to start
    ///
    /// Returns `None` when already simulated.
    pub fn transport_unavailable(&mut self, reason: &str) -> Option<ModeChange> {
        if self.state != ModeState::Live {
            return None;
        }
        tracing::error!("Transport unavailable: {}", reason);
        let cause = ModeChangeCause::TransportUnavailable {
            reason: reason.to_string(),
        };
        Some(self.transition(ModeState::Simulated, cause))
    }

    /// Record a successful broker connection
    pub fn record_connected(&mut self) {
        self.consecutive_failures = 0;
    }

    fn transition(&mut self, to: ModeState, cause: ModeChangeCause) -> ModeChange {
        let change = ModeChange {
            from: self.state,
            to,
            cause,
        };
        self.state = to;
        self.consecutive_failures = 0;

        tracing::info!("Mode changed: {} -> {} ({:?})", change.from, change.to, change.cause);
        for listener in &mut self.listeners {
            listener(&change);
        }
        change
    }
}
