//! Mock construction helpers

use envdash_rs::transport::{EventSink, Transport, TransportEvent};
use envdash_rs::EnvDashError;
use mockall::mock;
use std::sync::{Arc, Mutex};

mock! {
    pub Transport {}

    impl Transport for Transport {
        fn start(&mut self, topics: Vec<String>, sink: EventSink) -> envdash_rs::Result<()>;
        fn stop(&mut self);
        fn is_running(&self) -> bool;
    }
}

/// The sink handed to the most recent `start` call
#[derive(Clone, Default)]
pub struct SinkSlot(Arc<Mutex<Option<EventSink>>>);

impl SinkSlot {
    /// Emit an event as the transport thread would
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.0.lock().unwrap().as_ref() {
            Some(sink) => sink.emit(event),
            None => false,
        }
    }

    pub fn session(&self) -> Option<u64> {
        self.0.lock().unwrap().as_ref().map(EventSink::session)
    }

    pub fn is_set(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }
}

/// Mock that accepts any number of start/stop calls and records the sink
pub fn capturing_transport() -> (MockTransport, SinkSlot) {
    let slot = SinkSlot::default();
    let captured = slot.clone();

    let mut transport = MockTransport::new();
    transport.expect_start().returning(move |_, sink| {
        *captured.0.lock().unwrap() = Some(sink);
        Ok(())
    });
    transport.expect_stop().returning(|| ());
    transport.expect_is_running().return_const(false);
    (transport, slot)
}

/// Mock that must never be started
pub fn idle_transport() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.expect_start().never();
    transport.expect_stop().returning(|| ());
    transport.expect_is_running().return_const(false);
    transport
}

/// Mock whose single start call fails, as when the transport thread cannot spawn
pub fn failing_transport(reason: &'static str) -> MockTransport {
    let mut transport = MockTransport::new();
    transport
        .expect_start()
        .times(1)
        .returning(move |_, _| Err(EnvDashError::Transport(reason.into())));
    transport.expect_stop().returning(|| ());
    transport.expect_is_running().return_const(false);
    transport
}
