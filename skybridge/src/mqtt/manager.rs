//! Broker connection manager.
//!
//! `ConnectionManager` owns one logical broker session across the process
//! lifetime. Its `publish()` contract never blocks the caller indefinitely
//! and never silently drops data: while the session is down, messages are
//! queued FIFO and replayed in order once a connection is re-established.
//!
//! # State machine
//!
//! ```text
//!                 connect() ok: flush queue, online status, reset backoff
//!   Disconnected ──► Connecting ──────────────────────────► Connected
//!        ▲               │ failure/timeout: backoff++           │
//!        └───────────────┘◄── publish failure / ConnectionLost ─┘
//! ```
//!
//! The heartbeat task is the only self-healing trigger outside the
//! publish-failure path: every interval it either reports liveness on the
//! status topic (Connected) or attempts reconnection (otherwise).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffPolicy, BackoffState};
use super::transport::{MqttTransport, TransportError, TransportEvent};
use super::{ConnectionState, MqttConfig, MqttError, PendingMessage, QosLevel};
use crate::publish::TopicTree;

/// Default heartbeat/status interval in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Default bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default bound on shutdown-time broker operations.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Result of a `publish()` call.
///
/// Both variants are success from the caller's perspective; `Queued` means
/// delivery is deferred until the session is re-established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered to the session immediately.
    Sent,
    /// Held in the pending queue for replay after reconnection.
    Queued,
}

/// Session-wide settings for the connection manager.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Topic for online/offline/liveness status messages.
    pub status_topic: String,
    /// Default QoS applied when a publish does not override it.
    pub default_qos: QosLevel,
    /// Default retain flag applied when a publish does not override it.
    pub default_retain: bool,
    /// Whether a credential rejection aborts instead of retrying.
    pub auth_fatal: bool,
    /// Interval between heartbeat ticks.
    pub heartbeat_interval: Duration,
    /// Bound on a single transport connect attempt.
    pub connect_timeout: Duration,
    /// Bound on shutdown-time publish/disconnect operations.
    pub shutdown_timeout: Duration,
    /// Reconnect backoff parameters.
    pub backoff: BackoffPolicy,
}

impl SessionConfig {
    /// Build session settings from the broker deployment config.
    pub fn from_mqtt(config: &MqttConfig) -> Self {
        Self {
            status_topic: TopicTree::new(config.topic_prefix.as_str()).status(),
            default_qos: config.qos,
            default_retain: config.retain,
            auth_fatal: config.auth_fatal,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Set the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Maintains one logical session to the message broker.
pub struct ConnectionManager {
    transport: Arc<dyn MqttTransport>,
    config: SessionConfig,
    state: Mutex<ConnectionState>,
    /// Shared between the polling task (enqueue) and the connection task
    /// (drain), hence the mutex.
    pending: Mutex<VecDeque<PendingMessage>>,
    backoff: Mutex<BackoffState>,
    /// Generation of the current transport session; disconnect events
    /// carrying an older generation are stale and ignored.
    session_generation: AtomicU64,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    cancellation: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager over the given transport.
    ///
    /// `events` is the receiving half of the channel handed to the
    /// transport; `cancellation` interrupts backoff waits and stops the
    /// heartbeat task.
    pub fn new(
        transport: Arc<dyn MqttTransport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        config: SessionConfig,
        cancellation: CancellationToken,
    ) -> Self {
        let backoff = BackoffState::new(config.backoff.clone());
        Self {
            transport,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            pending: Mutex::new(VecDeque::new()),
            backoff: Mutex::new(backoff),
            session_generation: AtomicU64::new(0),
            events: tokio::sync::Mutex::new(events),
            cancellation,
        }
    }

    /// Current session state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Number of messages waiting for replay.
    pub fn queued_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn enqueue(&self, message: PendingMessage) {
        self.pending.lock().push_back(message);
    }

    /// Publish a message, queueing it if the session is down.
    ///
    /// `qos`/`retain` default to the session-wide configuration when not
    /// overridden. A transient broker outage is never surfaced as an error
    /// to the caller.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<String>,
        qos: Option<QosLevel>,
        retain: Option<bool>,
    ) -> PublishOutcome {
        debug_assert!(!topic.is_empty(), "publish requires a non-empty topic");
        let message = PendingMessage {
            topic: topic.to_string(),
            payload: payload.into(),
            qos: qos.unwrap_or(self.config.default_qos),
            retain: retain.unwrap_or(self.config.default_retain),
        };

        if self.state() != ConnectionState::Connected {
            self.enqueue(message);
            return PublishOutcome::Queued;
        }

        match self.transport.publish(&message).await {
            Ok(()) => PublishOutcome::Sent,
            Err(e) => {
                warn!(
                    "Publish to {} failed ({}), queueing for replay",
                    message.topic, e
                );
                self.enqueue(message);
                self.set_state(ConnectionState::Disconnected);
                PublishOutcome::Queued
            }
        }
    }

    /// Establish a session, retrying with backoff up to the configured
    /// attempt bound.
    ///
    /// On success the pending queue is flushed FIFO, an "online" status is
    /// published, and the backoff resets. Exhausting the bound returns
    /// [`MqttError::RetriesExhausted`]; the caller may keep operating in a
    /// degraded, publish-less mode (the heartbeat task will keep retrying).
    pub async fn connect(&self) -> Result<(), MqttError> {
        let max_attempts = self.config.backoff.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.set_state(ConnectionState::Connecting);
            info!(
                "Connecting to MQTT broker (attempt {}/{})",
                attempt, max_attempts
            );

            let outcome =
                tokio::time::timeout(self.config.connect_timeout, self.transport.connect()).await;
            match outcome {
                Ok(Ok(generation)) => {
                    self.session_generation.store(generation, Ordering::SeqCst);
                    self.on_connected().await;
                    return Ok(());
                }
                Ok(Err(TransportError::AuthRejected(reason))) => {
                    error!("MQTT authentication failed: {}", reason);
                    if self.config.auth_fatal {
                        self.set_state(ConnectionState::Disconnected);
                        return Err(MqttError::AuthRejected(reason));
                    }
                }
                Ok(Err(e)) => warn!("MQTT connection failed: {}", e),
                Err(_) => warn!("MQTT connection attempt timed out"),
            }

            self.set_state(ConnectionState::Disconnected);
            let delay = self.backoff.lock().next_delay();
            if attempt == max_attempts {
                break;
            }
            debug!("Retrying MQTT connection in {:?}", delay);
            tokio::select! {
                _ = self.cancellation.cancelled() => return Err(MqttError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(MqttError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    async fn on_connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.backoff.lock().reset();
        info!("Connected to MQTT broker");
        self.flush_pending().await;
        self.publish_status("online").await;
    }

    /// Replay queued messages in FIFO order.
    ///
    /// Stops at the first failure; the failed message goes back to the
    /// front of the queue so ordering is preserved for the next attempt.
    async fn flush_pending(&self) {
        let mut flushed = 0usize;
        loop {
            let Some(message) = self.pending.lock().pop_front() else {
                break;
            };
            if let Err(e) = self.transport.publish(&message).await {
                warn!(
                    "Replay of {} failed ({}), keeping message queued",
                    message.topic, e
                );
                self.pending.lock().push_front(message);
                self.set_state(ConnectionState::Disconnected);
                break;
            }
            flushed += 1;
        }
        if flushed > 0 {
            info!("Replayed {} queued messages", flushed);
        }
    }

    async fn publish_status(&self, status: &str) {
        let payload = serde_json::json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
        .to_string();
        // Status is always retained so late subscribers see liveness.
        let _ = self
            .publish(&self.config.status_topic, payload, None, Some(true))
            .await;
    }

    /// Heartbeat and event loop; runs until cancellation.
    ///
    /// This is the connection's own execution context: broker-initiated
    /// events arrive here without blocking the polling cycle.
    pub async fn run(&self) {
        let mut events = self.events.lock().await;
        let first_tick = tokio::time::Instant::now() + self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(first_tick, self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                _ = heartbeat.tick() => self.on_heartbeat().await,
                Some(event) = events.recv() => self.on_event(event),
            }
        }
    }

    async fn on_heartbeat(&self) {
        if self.state() == ConnectionState::Connected {
            self.publish_status("online").await;
            return;
        }

        match self.connect().await {
            Ok(()) => {}
            Err(MqttError::AuthRejected(reason)) => {
                // Only reachable with auth_fatal set.
                error!("Fatal MQTT authentication rejection: {}", reason);
                self.cancellation.cancel();
            }
            Err(MqttError::Cancelled) => {}
            Err(e) => warn!("Reconnection failed, will retry on next heartbeat: {}", e),
        }
    }

    fn on_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionLost { generation, reason } => {
                // A poll task can outlive its session long enough to report
                // a disconnect after a reconnect already succeeded; that
                // event describes the replaced session, not the current one.
                if generation != self.session_generation.load(Ordering::SeqCst) {
                    debug!(
                        "Ignoring disconnect from replaced session {}: {}",
                        generation, reason
                    );
                    return;
                }
                warn!("Disconnected from MQTT broker: {}", reason);
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Release the session: best-effort "offline" status, then disconnect.
    ///
    /// Runs on every termination path. Both broker operations are
    /// time-bounded so shutdown cannot hang on a dead broker; the offline
    /// publish is attempted regardless of the current state.
    pub async fn shutdown(&self) {
        info!("Shutting down MQTT session");
        let payload = serde_json::json!({
            "status": "offline",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
        .to_string();
        let message = PendingMessage {
            topic: self.config.status_topic.clone(),
            payload,
            qos: self.config.default_qos,
            retain: true,
        };

        match tokio::time::timeout(self.config.shutdown_timeout, self.transport.publish(&message))
            .await
        {
            Ok(Ok(())) => debug!("Offline status published"),
            Ok(Err(e)) => debug!("Offline status publish failed: {}", e),
            Err(_) => debug!("Offline status publish timed out"),
        }

        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.transport.disconnect())
            .await;
        self.set_state(ConnectionState::Disconnected);
    }
}
