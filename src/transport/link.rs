//! Connection lifecycle bookkeeping
//!
//! [`LinkTracker`] maps raw transport outcomes (attempt started, broker
//! acknowledged, error, stop) onto [`ConnectionState`] transitions and the
//! events reported to the dashboard. It holds no I/O so the lifecycle can be
//! tested without a broker.

use super::TransportEvent;
use crate::types::ConnectionState;

/// Connection state plus whether a session was ever established
#[derive(Debug, Clone, Default)]
pub struct LinkTracker {
    state: ConnectionState,
    established: bool,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the broker has acknowledged at least one session
    pub fn was_established(&self) -> bool {
        self.established
    }

    /// A connect attempt is starting
    pub fn begin_attempt(&mut self) -> Vec<TransportEvent> {
        self.move_to(ConnectionState::Connecting)
    }

    /// The broker acknowledged the session
    pub fn connected(&mut self) -> Vec<TransportEvent> {
        self.established = true;
        let mut events = self.move_to(ConnectionState::Connected);
        events.push(TransportEvent::Connected);
        events
    }

    /// The current attempt or session failed
    ///
    /// - an established session dropping reports `Disconnected` and moves to
    ///   reconnecting
    /// - a failed retry after an earlier session stays in reconnecting
    /// - a failure before any session reports `ConnectFailed`
    pub fn failed(&mut self, reason: &str) -> Vec<TransportEvent> {
        match self.state {
            ConnectionState::Connected => {
                let mut events = self.move_to(ConnectionState::Reconnecting);
                events.push(TransportEvent::Disconnected {
                    reason: reason.to_string(),
                });
                events
            }
            _ if self.established => self.move_to(ConnectionState::Reconnecting),
            _ => {
                let mut events = self.move_to(ConnectionState::Disconnected);
                events.push(TransportEvent::ConnectFailed {
                    reason: reason.to_string(),
                });
                events
            }
        }
    }

    /// Deliberate shutdown
    pub fn stopped(&mut self) -> Vec<TransportEvent> {
        let mut events = self.move_to(ConnectionState::Disconnected);
        events.push(TransportEvent::Stopped);
        events
    }

    fn move_to(&mut self, next: ConnectionState) -> Vec<TransportEvent> {
        if self.state == next {
            return Vec::new();
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!("Unexpected connection transition {} -> {}", self.state, next);
        }
        self.state = next;
        vec![TransportEvent::StateChanged(next)]
    }
}
