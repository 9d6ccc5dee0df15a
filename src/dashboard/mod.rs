//! Dashboard engine
//!
//! [`Dashboard`] wires the core components together for one dashboard
//! instance and is the only place where dashboard state is mutated. It runs
//! on a single thread (the UI or timer thread):
//!
//! - the transport thread pushes [`TransportEnvelope`]s into a bounded queue
//! - [`Dashboard::pump`] drains that queue and applies each event
//! - [`Dashboard::tick`] pumps, feeds the synthetic generator in simulated
//!   mode, and asks the [`RefreshScheduler`] for a snapshot
//!
//! Mode transitions run in the same apply step as ingestion, so clearing the
//! stores can never interleave with a half-applied sample. Each transition
//! also starts a new transport session; envelopes from an earlier session are
//! counted as stale and discarded.
//!
//! [`DashboardRunner`] drives a dashboard on its own thread for hosts that do
//! not have a timer loop of their own.

pub mod runner;

pub use runner::{DashboardCommand, DashboardHandle, DashboardRunner};

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::ingest::IngestDispatcher;
use crate::mode::{ModeChange, ModeController};
use crate::registry::ChannelRegistry;
use crate::scheduler::{RefreshScheduler, SchedulerHandle, SnapshotSource};
use crate::simulator::SyntheticGenerator;
use crate::store::SensorStore;
use crate::transport::{EventSink, Transport, TransportEnvelope, TransportEvent};
use crate::types::{
    ConnectionState, DashboardSnapshot, IngestResult, IngestSource, IngestStats, ModeState,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something the presentation layer should know about
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// A refresh tick produced a new view
    Snapshot(DashboardSnapshot),
    /// The data source changed
    ModeChanged(ModeChange),
    /// The broker connection state changed
    ConnectionChanged(ConnectionState),
    /// The dashboard stopped; nothing follows this event
    Shutdown,
}

/// One dashboard instance: registry, stores, mode, transport and scheduler
pub struct Dashboard {
    registry: Arc<ChannelRegistry>,
    dispatcher: IngestDispatcher,
    mode: ModeController,
    generator: SyntheticGenerator,
    transport: Box<dyn Transport>,
    broker_configured: bool,
    events_tx: Sender<TransportEnvelope>,
    events_rx: Receiver<TransportEnvelope>,
    queue_capacity: usize,
    queue_dropped: Arc<AtomicU64>,
    session: u64,
    connection: ConnectionState,
    scheduler: RefreshScheduler,
    sim_tick: Duration,
    /// `None` means a synthetic batch is due on the next tick
    next_sim_tick: Option<Instant>,
    pending: Vec<DashboardEvent>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("mode", &self.mode.state())
            .field("connection", &self.connection)
            .field("session", &self.session)
            .field("channels", &self.registry.len())
            .field("transport_running", &self.transport.is_running())
            .finish()
    }
}

impl Dashboard {
    /// Build a dashboard from a validated config
    ///
    /// Misconfiguration (duplicate topics, zero capacity, bad intervals) is
    /// reported here; nothing is started until [`Dashboard::start`].
    pub fn new(config: &DashboardConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(config.registry()?);
        let dispatcher = IngestDispatcher::new(registry.clone(), config.history.capacity)?;
        let mode = ModeController::new(config.broker.is_some(), config.fallback.failure_threshold);
        let generator = SyntheticGenerator::new(&registry, config.simulation.seed);
        let scheduler = RefreshScheduler::new(
            config.refresh.value_interval(),
            config.refresh.chart_interval(),
        );
        let (events_tx, events_rx) = bounded(config.queue.capacity);

        tracing::info!(
            "Dashboard created: {} channels, history {}, initial mode {}",
            registry.len(),
            config.history.capacity,
            mode.state()
        );

        Ok(Self {
            registry,
            dispatcher,
            mode,
            generator,
            transport,
            broker_configured: config.broker.is_some(),
            events_tx,
            events_rx,
            queue_capacity: config.queue.capacity,
            queue_dropped: Arc::new(AtomicU64::new(0)),
            session: 0,
            connection: ConnectionState::Disconnected,
            scheduler,
            sim_tick: config.simulation.tick(),
            next_sim_tick: None,
            pending: Vec::new(),
        })
    }

    /// Enter the initial mode: connect when live, otherwise arm the generator
    pub fn start(&mut self) {
        match self.mode.state() {
            ModeState::Live => self.connect(),
            ModeState::Simulated => {
                tracing::info!("No broker configured, starting with simulated data");
                self.next_sim_tick = None;
            }
        }
    }

    // ==================== Accessors ====================

    pub fn mode(&self) -> ModeState {
        self.mode.state()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Current transport session id
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SensorStore {
        self.dispatcher.store()
    }

    pub fn mode_controller(&self) -> &ModeController {
        &self.mode
    }

    pub fn transport_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Ingest counters including queue overflow
    pub fn stats(&self) -> IngestStats {
        let mut stats = self.dispatcher.stats().clone();
        stats.dropped_queue_full = self.queue_dropped.load(Ordering::Relaxed);
        stats
    }

    /// Handle that cancels snapshot production
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Register a callback fired on every mode transition
    pub fn on_mode_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&ModeChange) + Send + 'static,
    {
        self.mode.on_mode_changed(listener);
    }

    /// Snapshot of the current state, ignoring the refresh cadences
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.source().capture()
    }

    fn source(&self) -> SnapshotSource<'_> {
        SnapshotSource {
            mode: self.mode.state(),
            connection: self.connection,
            registry: &self.registry,
            store: self.dispatcher.store(),
        }
    }

    // ==================== Mode ====================

    /// Flip between live and simulated (user action)
    pub fn toggle_mode(&mut self) -> ModeChange {
        let change = self.mode.toggle();
        self.apply_transition(&change);
        change
    }

    fn apply_transition(&mut self, change: &ModeChange) {
        self.pending.push(DashboardEvent::ModeChanged(change.clone()));

        // Anything still queued belongs to the previous mode.
        self.session += 1;
        self.dispatcher.clear();
        self.scheduler.invalidate_charts();
        self.next_sim_tick = None;

        match change.to {
            ModeState::Simulated => {
                self.transport.stop();
                self.set_connection(ConnectionState::Disconnected);
                self.generator.reset();
                if change.is_automatic() {
                    tracing::warn!("Falling back to simulated data: {:?}", change.cause);
                }
            }
            ModeState::Live => self.connect(),
        }
    }

    fn connect(&mut self) {
        if !self.broker_configured {
            tracing::warn!("Live mode selected but no broker is configured");
            return;
        }

        self.session += 1;
        let sink = EventSink::new(self.session, self.events_tx.clone(), self.queue_dropped.clone());
        if let Err(e) = self.transport.start(self.registry.topics(), sink) {
            // Nothing will retry a transport that failed to start
            if let Some(change) = self.mode.transport_unavailable(&e.to_string()) {
                self.apply_transition(&change);
            }
        }
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            tracing::debug!("Connection {} -> {}", self.connection, state);
            self.connection = state;
            self.pending.push(DashboardEvent::ConnectionChanged(state));
        }
    }

    // ==================== Apply step ====================

    /// Apply queued transport events; returns how many were taken off the queue
    ///
    /// At most one queue's worth is drained per call so a flood of messages
    /// cannot starve the refresh cadence.
    pub fn pump(&mut self) -> usize {
        let mut taken = 0;
        while taken < self.queue_capacity {
            let Ok(envelope) = self.events_rx.try_recv() else {
                break;
            };
            taken += 1;

            if envelope.session != self.session {
                self.dispatcher.stats_mut().dropped_stale += 1;
                continue;
            }
            self.apply_event(envelope.event);
        }
        taken
    }

    fn apply_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::StateChanged(state) => self.set_connection(state),
            TransportEvent::Connected => {
                tracing::info!("Broker session established");
                self.mode.record_connected();
            }
            TransportEvent::Message { topic, payload } => {
                self.ingest_from(IngestSource::Transport, &topic, &payload);
            }
            TransportEvent::ConnectFailed { reason } => {
                if let Some(change) = self.mode.record_connect_failure(&reason) {
                    self.apply_transition(&change);
                }
            }
            TransportEvent::Disconnected { reason } => {
                tracing::warn!("Broker connection lost: {}", reason);
            }
            TransportEvent::Stopped => {
                tracing::debug!("Transport session {} stopped", self.session);
            }
        }
    }

    /// Route a raw message from `source` through the dispatcher
    ///
    /// Returns `None` when the source may not write this topic in the current
    /// mode; the message is dropped without touching any store.
    pub fn ingest_from(
        &mut self,
        source: IngestSource,
        wire_topic: &str,
        raw_payload: &str,
    ) -> Option<IngestResult> {
        if !source.allowed_in(self.mode.state()) || !self.may_write(source, wire_topic) {
            self.dispatcher.stats_mut().dropped_wrong_mode += 1;
            tracing::trace!(
                "Dropped {:?} message on '{}' in {} mode",
                source,
                wire_topic,
                self.mode.state()
            );
            return None;
        }
        Some(self.dispatcher.ingest(wire_topic, raw_payload))
    }

    /// Host-injected data may only land on channels marked external
    fn may_write(&self, source: IngestSource, wire_topic: &str) -> bool {
        source != IngestSource::External
            || self.registry.resolve(wire_topic).map_or(true, |c| c.external)
    }

    /// Ingest weather or advice data supplied by the host
    ///
    /// Accepted in both modes, but only for external channels; sensor topics
    /// are dropped like any other wrong-source message.
    pub fn ingest_external(&mut self, wire_topic: &str, raw_payload: &str) -> Option<IngestResult> {
        self.ingest_from(IngestSource::External, wire_topic, raw_payload)
    }

    /// Produce and apply one synthetic batch; returns the samples applied
    pub fn run_synthetic_tick(&mut self) -> usize {
        if !IngestSource::Synthetic.allowed_in(self.mode.state()) {
            return 0;
        }
        self.generator
            .generate()
            .into_iter()
            .filter(|(key, value)| self.dispatcher.ingest_value(key, value.clone()).is_applied())
            .count()
    }

    /// One pass of the apply loop at time `now`
    ///
    /// Returns mode/connection changes observed since the last call followed
    /// by a snapshot when the scheduler says one is due.
    pub fn tick(&mut self, now: Instant) -> Vec<DashboardEvent> {
        if self.scheduler.is_cancelled() {
            return std::mem::take(&mut self.pending);
        }

        self.pump();

        let sim_due = self.next_sim_tick.map_or(true, |at| now >= at);
        if self.mode.state() == ModeState::Simulated && sim_due {
            self.run_synthetic_tick();
            self.next_sim_tick = Some(now + self.sim_tick);
        }

        let source = SnapshotSource {
            mode: self.mode.state(),
            connection: self.connection,
            registry: &self.registry,
            store: self.dispatcher.store(),
        };
        let snapshot = self.scheduler.poll(now, source);
        let mut events = std::mem::take(&mut self.pending);
        events.extend(snapshot.map(DashboardEvent::Snapshot));
        events
    }

    /// Stop the transport and the scheduler
    pub fn shutdown(&mut self) {
        tracing::info!("Dashboard shutting down");
        self.scheduler.cancel();
        self.transport.stop();
        self.session += 1;
        self.set_connection(ConnectionState::Disconnected);
    }
}
