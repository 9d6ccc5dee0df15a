//! MQTT transport built on rumqttc
//!
//! Each `start()` spawns a dedicated thread running a current-thread tokio
//! runtime that drives the rumqttc event loop. The thread:
//!
//! 1. connects and, on CONNACK, subscribes to every registry topic
//! 2. forwards each publish to the sink as a UTF-8 payload
//! 3. on error, reports through [`LinkTracker`] and waits out the backoff
//!    delay before polling again
//!
//! `stop()` cancels the token, which interrupts both polling and backoff
//! sleeps, sends DISCONNECT when a session is up, and joins the thread.

use super::{Backoff, BackoffPolicy, EventSink, LinkTracker, Transport, TransportEvent};
use crate::config::BrokerConfig;
use crate::error::{EnvDashError, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 64;

/// How long a graceful disconnect may take before the thread gives up
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// [`Transport`] backed by an MQTT 3.1.1 broker
pub struct MqttTransport {
    broker: BrokerConfig,
    backoff: BackoffPolicy,
    worker: Option<Worker>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("broker", &self.broker.address())
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl MqttTransport {
    pub fn new(broker: BrokerConfig, backoff: BackoffPolicy) -> Self {
        Self {
            broker,
            backoff,
            worker: None,
        }
    }

    pub fn broker(&self) -> &BrokerConfig {
        &self.broker
    }

    fn mqtt_options(&self) -> MqttOptions {
        let broker = &self.broker;
        let mut options = MqttOptions::new(&broker.client_id, &broker.host, broker.port);
        options.set_keep_alive(broker.keep_alive());
        options.set_clean_session(true);
        if let Some(username) = &broker.username {
            let password = broker.password.clone().unwrap_or_default();
            options.set_credentials(username.clone(), password);
        }
        options
    }
}

impl Transport for MqttTransport {
    fn start(&mut self, topics: Vec<String>, sink: EventSink) -> Result<()> {
        if self.worker.is_some() {
            tracing::debug!("Restarting MQTT transport for session {}", sink.session());
            self.stop();
        }

        let options = self.mqtt_options();
        let policy = self.backoff;
        let connect_timeout = self.broker.connect_timeout();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tracing::info!(
            "Starting MQTT transport to {} ({} topics, session {})",
            self.broker.address(),
            topics.len(),
            sink.session()
        );

        let handle = std::thread::Builder::new()
            .name("mqtt-transport".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build();
                let runtime = match runtime {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Failed to build transport runtime: {}", e);
                        sink.emit(TransportEvent::ConnectFailed {
                            reason: format!("runtime unavailable: {}", e),
                        });
                        return;
                    }
                };
                runtime.block_on(drive(options, topics, policy, connect_timeout, sink, token));
            })
            .map_err(|e| {
                EnvDashError::Transport(format!("failed to spawn transport thread: {}", e))
            })?;

        self.worker = Some(Worker { cancel, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.cancel();
        if worker.handle.join().is_err() {
            tracing::error!("MQTT transport thread panicked");
        } else {
            tracing::info!("MQTT transport stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connection loop for one transport session
async fn drive(
    options: MqttOptions,
    topics: Vec<String>,
    policy: BackoffPolicy,
    connect_timeout: Duration,
    sink: EventSink,
    cancel: CancellationToken,
) {
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let mut link = LinkTracker::new();
    let mut backoff = Backoff::new(policy);

    loop {
        if !sink.emit_all(link.begin_attempt()) {
            return;
        }

        let deadline = tokio::time::sleep(connect_timeout);
        tokio::pin!(deadline);

        let failure = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if link.state().is_connected() {
                        disconnect(&client, &mut eventloop).await;
                    }
                    sink.emit_all(link.stopped());
                    return;
                }
                _ = &mut deadline, if !link.state().is_connected() => {
                    break format!("no CONNACK within {} ms", connect_timeout.as_millis());
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        backoff.reset();
                        for topic in &topics {
                            if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                                tracing::warn!("Failed to subscribe to '{}': {}", topic, e);
                            }
                        }
                        tracing::info!(
                            "Connected to broker, subscribed to {} topics",
                            topics.len()
                        );
                        if !sink.emit_all(link.connected()) {
                            return;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                        let message = TransportEvent::Message {
                            topic: publish.topic,
                            payload,
                        };
                        if !sink.emit(message) {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => break e.to_string(),
                }
            }
        };

        tracing::warn!("Broker connection failed: {}", failure);
        if !sink.emit_all(link.failed(&failure)) {
            return;
        }

        let delay = backoff.next_delay();
        tracing::info!("Retrying broker connection in {:.1}s", delay.as_secs_f64());
        tokio::select! {
            _ = cancel.cancelled() => {
                sink.emit_all(link.stopped());
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Send DISCONNECT and give the event loop a moment to flush it
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        tracing::debug!("Broker did not confirm DISCONNECT in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportEnvelope;
    use crate::types::ConnectionState;
    use crossbeam_channel::bounded;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn unreachable_broker() -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_ms: 300,
            ..BrokerConfig::default()
        }
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut transport = MqttTransport::new(unreachable_broker(), BackoffPolicy::default());
        transport.stop();
        transport.stop();
        assert!(!transport.is_running());
    }

    #[test]
    fn test_refused_connection_reports_connect_failed_then_stops() {
        let (tx, rx) = bounded::<TransportEnvelope>(64);
        let sink = EventSink::new(1, tx, Arc::new(AtomicU64::new(0)));
        let policy = BackoffPolicy {
            base_ms: 50,
            cap_ms: 100,
            ..BackoffPolicy::default()
        };
        let mut transport = MqttTransport::new(unreachable_broker(), policy);
        transport.start(vec!["siot/噪音".into()], sink).unwrap();

        let failed = loop {
            let envelope = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(envelope.session, 1);
            if let TransportEvent::ConnectFailed { reason } = envelope.event {
                break reason;
            }
        };
        assert!(!failed.is_empty());

        transport.stop();
        assert!(!transport.is_running());

        let rest: Vec<TransportEvent> = rx.try_iter().map(|e| e.event).collect();
        assert_eq!(rest.last(), Some(&TransportEvent::Stopped));
        assert!(!rest.contains(&TransportEvent::StateChanged(ConnectionState::Connected)));
    }
}
