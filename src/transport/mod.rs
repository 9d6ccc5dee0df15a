//! Broker transport
//!
//! The transport owns the broker connection and runs on its own thread. It
//! never touches dashboard state: everything it observes is pushed into a
//! bounded crossbeam channel as a [`TransportEnvelope`] and applied later by
//! the dashboard on its own thread.
//!
//! # Components
//!
//! - [`Transport`] - start/stop seam implemented by [`MqttTransport`] and by
//!   test doubles
//! - [`EventSink`] - session-tagged sender handed to the transport on start
//! - [`LinkTracker`] - connection lifecycle bookkeeping
//! - [`Backoff`] / [`BackoffPolicy`] - reconnect delays
//!
//! # Sessions
//!
//! Every `start()` receives a sink stamped with a session id. The dashboard
//! bumps its session on each mode transition and drops envelopes carrying an
//! older id, so messages queued before a transition never leak into the new
//! mode.

pub mod backoff;
pub mod link;
pub mod mqtt;

pub use backoff::{Backoff, BackoffPolicy, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS};
pub use link::LinkTracker;
pub use mqtt::MqttTransport;

use crate::error::Result;
use crate::types::ConnectionState;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the transport event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How long a lifecycle event may wait for queue space before being dropped
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Something the transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection state changed
    StateChanged(ConnectionState),
    /// Broker acknowledged the session and subscriptions were issued
    Connected,
    /// A publish arrived
    Message { topic: String, payload: String },
    /// An attempt failed before any session was established
    ConnectFailed { reason: String },
    /// An established session dropped; reconnecting in the background
    Disconnected { reason: String },
    /// The transport was stopped and will not reconnect
    Stopped,
}

impl TransportEvent {
    /// Lifecycle events must not be lost to a momentarily full queue
    fn is_control(&self) -> bool {
        !matches!(self, TransportEvent::Message { .. })
    }
}

/// A [`TransportEvent`] stamped with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub session: u64,
    pub event: TransportEvent,
}

/// Sending half of the transport queue, bound to one session
#[derive(Debug, Clone)]
pub struct EventSink {
    session: u64,
    tx: Sender<TransportEnvelope>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new(session: u64, tx: Sender<TransportEnvelope>, dropped: Arc<AtomicU64>) -> Self {
        Self { session, tx, dropped }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Queue an event
    ///
    /// Messages are dropped (and counted) when the queue is full. Lifecycle
    /// events wait briefly for space. Returns `false` once the receiving side
    /// is gone, which tells the transport to wind down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let envelope = TransportEnvelope {
            session: self.session,
            event,
        };

        if envelope.event.is_control() {
            match self.tx.send_timeout(envelope, CONTROL_SEND_TIMEOUT) {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(envelope)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Event queue full, dropped {:?}", envelope.event);
                    true
                }
                Err(SendTimeoutError::Disconnected(_)) => false,
            }
        } else {
            match self.tx.try_send(envelope) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        }
    }

    /// Queue several events in order; stops early if the receiver is gone
    pub fn emit_all(&self, events: impl IntoIterator<Item = TransportEvent>) -> bool {
        events.into_iter().all(|event| self.emit(event))
    }

    /// Events lost to a full queue across all sessions sharing the counter
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A broker connection driven from a background thread
///
/// `start` must not block on the network; results arrive through the sink.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Begin connecting and subscribe to `topics` once the broker accepts
    ///
    /// Restarts the connection if one is already running.
    fn start(&mut self, topics: Vec<String>, sink: EventSink) -> Result<()>;

    /// Disconnect, cancel pending retries, and wait for the worker to exit
    ///
    /// Calling `stop` on a stopped transport is a no-op.
    fn stop(&mut self);

    /// Whether a worker is currently running
    fn is_running(&self) -> bool;
}
