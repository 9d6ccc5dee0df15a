//! Dashboard runner thread
//!
//! Hosts without their own timer loop can hand a [`Dashboard`] to a
//! [`DashboardRunner`], which owns it on a dedicated thread and talks to the
//! presentation layer through crossbeam channels:
//!
//! - [`DashboardCommand`] - presentation layer to dashboard (toggle, inject,
//!   shutdown)
//! - [`DashboardEvent`] - dashboard to presentation layer (snapshots, mode
//!   and connection changes)
//! - [`DashboardHandle`] - presentation-side end of both channels
//!
//! # Example
//!
//! ```ignore
//! use envdash_rs::config::DashboardConfig;
//! use envdash_rs::dashboard::{Dashboard, DashboardEvent, DashboardRunner};
//! use envdash_rs::transport::MqttTransport;
//!
//! let config = DashboardConfig::with_broker("localhost", 1883);
//! let transport = MqttTransport::new(config.broker.clone().unwrap(), config.backoff);
//! let dashboard = Dashboard::new(&config, Box::new(transport))?;
//!
//! let (runner, handle) = DashboardRunner::new(dashboard);
//! let thread = runner.spawn()?;
//!
//! for event in handle.drain() {
//!     if let DashboardEvent::Snapshot(snapshot) = event {
//!         // render
//!     }
//! }
//!
//! handle.shutdown();
//! thread.join().ok();
//! ```

use super::{Dashboard, DashboardEvent};
use crate::error::{EnvDashError, Result};
use crossbeam_channel::{
    bounded, select, tick, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default interval of the apply loop
pub const DEFAULT_APPLY_INTERVAL_MS: u64 = 100;

/// Capacity of the event channel towards the presentation layer
const EVENT_CAPACITY: usize = 1024;

/// How long a mode/connection/shutdown event may wait for a lagging consumer
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Message sent from the presentation layer to the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    /// Flip between live and simulated data
    ToggleMode,
    /// Feed a weather/advice value supplied by the host
    Inject { topic: String, payload: String },
    /// Stop the dashboard
    Shutdown,
}

/// Presentation-side handle for a running dashboard
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    command_tx: Sender<DashboardCommand>,
    event_rx: Receiver<DashboardEvent>,
}

impl DashboardHandle {
    /// Send a command to the dashboard
    pub fn send_command(&self, command: DashboardCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    /// Request a mode toggle
    pub fn toggle_mode(&self) {
        let _ = self.command_tx.send(DashboardCommand::ToggleMode);
    }

    /// Inject an external value (weather, advice)
    pub fn inject(&self, topic: impl Into<String>, payload: impl Into<String>) {
        let _ = self.command_tx.send(DashboardCommand::Inject {
            topic: topic.into(),
            payload: payload.into(),
        });
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(DashboardCommand::Shutdown);
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<DashboardEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    ///
    /// Returns `None` on timeout or once the runner has exited.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DashboardEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receive all pending events
    pub fn drain(&self) -> Vec<DashboardEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Owns a [`Dashboard`] and runs its apply loop
pub struct DashboardRunner {
    dashboard: Dashboard,
    command_rx: Receiver<DashboardCommand>,
    event_tx: Sender<DashboardEvent>,
    apply_interval: Duration,
}

impl DashboardRunner {
    /// Create a runner and the handle that talks to it
    pub fn new(dashboard: Dashboard) -> (Self, DashboardHandle) {
        let (command_tx, command_rx) = bounded(256);
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        let runner = Self {
            dashboard,
            command_rx,
            event_tx,
            apply_interval: Duration::from_millis(DEFAULT_APPLY_INTERVAL_MS),
        };
        let handle = DashboardHandle { command_tx, event_rx };
        (runner, handle)
    }

    /// Override how often queued transport events are applied
    pub fn with_apply_interval(mut self, interval: Duration) -> Self {
        self.apply_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Run the loop on a new thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("dashboard".into())
            .spawn(move || self.run())
            .map_err(|e| EnvDashError::Channel(format!("failed to spawn dashboard thread: {}", e)))
    }

    /// Run the loop on the current thread until shutdown
    pub fn run(mut self) {
        tracing::info!("Dashboard runner started");
        self.dashboard.start();
        let ticker = tick(self.apply_interval);
        let commands = self.command_rx.clone();

        let mut running = self.forward(Instant::now());
        while running {
            select! {
                recv(commands) -> command => {
                    running = match command {
                        Ok(DashboardCommand::Shutdown) | Err(_) => false,
                        Ok(command) => {
                            self.handle_command(command);
                            self.forward(Instant::now())
                        }
                    };
                }
                recv(ticker) -> _ => {
                    running = self.forward(Instant::now());
                }
            }
        }

        self.dashboard.shutdown();
        self.send(DashboardEvent::Shutdown);
        tracing::info!("Dashboard runner stopped");
    }

    fn handle_command(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::ToggleMode => {
                self.dashboard.toggle_mode();
            }
            DashboardCommand::Inject { topic, payload } => {
                let result = self.dashboard.ingest_external(&topic, &payload);
                tracing::debug!("Injected '{}': {:?}", topic, result);
            }
            DashboardCommand::Shutdown => {}
        }
    }

    /// Tick the dashboard and pass its events on
    ///
    /// Returns `false` once the handle has been dropped.
    fn forward(&mut self, now: Instant) -> bool {
        self.dashboard.tick(now).into_iter().all(|event| self.send(event))
    }

    /// Send one event; snapshots are dropped when the consumer lags, other
    /// events wait up to [`CONTROL_SEND_TIMEOUT`]
    ///
    /// Returns `false` once the handle has been dropped.
    fn send(&self, event: DashboardEvent) -> bool {
        if matches!(event, DashboardEvent::Snapshot(_)) {
            return match self.event_tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Event channel full, skipped a snapshot");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            };
        }

        match self.event_tx.send_timeout(event, CONTROL_SEND_TIMEOUT) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(event)) => {
                tracing::warn!("Presentation layer not draining events, dropped {:?}", event);
                true
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }
}
