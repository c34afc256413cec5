//! Broker transport seam.
//!
//! [`MqttTransport`] is the boundary between the connection manager's state
//! machine and the wire. It exists for the same reason as the fetcher's
//! `HttpClient` trait: dependency injection, so the manager's queueing and
//! backoff behavior is testable against a scripted mock without a broker.
//!
//! Broker-initiated events (unexpected disconnects) are delivered on an
//! explicit [`TransportEvent`] channel handed to the transport at
//! construction time; the manager translates them into state transitions.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{MqttConfig, PendingMessage, QosLevel};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// MQTT keep-alive interval in seconds.
const KEEP_ALIVE_SECS: u64 = 60;

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Transport-level errors.
///
/// Everything except `AuthRejected` is recoverable: the manager queues the
/// message and schedules a reconnect. `AuthRejected` is recoverable too
/// unless the deployment configures it as fatal.
#[derive(Clone, Debug, Error)]
pub enum TransportError {
    /// Could not establish a session.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The broker refused the configured credentials.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// A publish could not be handed to the session.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// No session is established.
    #[error("Not connected to broker")]
    NotConnected,
}

/// Broker-initiated event, observed asynchronously by the manager.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The session dropped outside of an explicit `disconnect()`.
    ConnectionLost {
        /// Generation of the session that dropped; lets the manager
        /// discard events from a session it has already replaced.
        generation: u64,
        /// Transport-level reason, for logging.
        reason: String,
    },
}

/// Trait for broker session operations.
///
/// Methods return [`BoxFuture`]s so the trait stays object-safe; the
/// manager holds it as `Arc<dyn MqttTransport>`.
pub trait MqttTransport: Send + Sync {
    /// Establish a session, replacing any existing one.
    ///
    /// Resolves once the broker has acknowledged the connection, yielding
    /// a monotonically increasing session generation. Events reported for
    /// earlier generations refer to sessions this call has replaced.
    fn connect(&self) -> BoxFuture<'_, Result<u64, TransportError>>;

    /// Deliver one message over the current session.
    fn publish<'a>(&'a self, message: &'a PendingMessage)
        -> BoxFuture<'a, Result<(), TransportError>>;

    /// Release the session. Idempotent.
    fn disconnect(&self) -> BoxFuture<'_, Result<(), TransportError>>;
}

impl From<QosLevel> for QoS {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// A live rumqttc session: the client handle plus its polling task.
struct Session {
    client: AsyncClient,
    poll_task: JoinHandle<()>,
}

/// Production transport backed by rumqttc.
///
/// Each `connect()` builds a fresh client/event-loop pair and spawns a task
/// that keeps polling the event loop (rumqttc performs no network I/O
/// unless polled). When polling fails the task reports a
/// [`TransportEvent::ConnectionLost`] and exits, leaving reconnection
/// entirely to the manager's policy rather than rumqttc's internal retry.
pub struct RumqttcTransport {
    config: MqttConfig,
    client_id: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    session: Mutex<Option<Session>>,
    generation: AtomicU64,
}

impl RumqttcTransport {
    /// Create a transport that reports events on `events`.
    pub fn new(
        config: MqttConfig,
        client_id: impl Into<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            config,
            client_id: client_id.into(),
            events,
            session: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            options.set_credentials(user.clone(), pass.clone());
        }
        options
    }

    fn teardown(&self) {
        if let Some(session) = self.session.lock().take() {
            session.poll_task.abort();
        }
    }

    fn classify_refusal(code: ConnectReturnCode) -> TransportError {
        match code {
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
                TransportError::AuthRejected(format!("{:?}", code))
            }
            other => TransportError::Connect(format!("broker refused connection: {:?}", other)),
        }
    }
}

impl MqttTransport for RumqttcTransport {
    fn connect(&self) -> BoxFuture<'_, Result<u64, TransportError>> {
        Box::pin(async move {
            self.teardown();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

            let (client, mut eventloop) =
                AsyncClient::new(self.options(), REQUEST_CHANNEL_CAPACITY);

            // Drive the event loop until the broker acknowledges us.
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => match ack.code {
                        ConnectReturnCode::Success => break,
                        code => return Err(Self::classify_refusal(code)),
                    },
                    Ok(event) => {
                        trace!("Pre-ack event: {:?}", event);
                    }
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        return Err(Self::classify_refusal(code));
                    }
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }

            let events = self.events.clone();
            let poll_task = tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(event) => trace!("MQTT event: {:?}", event),
                        Err(e) => {
                            debug!("MQTT event loop terminated: {}", e);
                            let _ = events.send(TransportEvent::ConnectionLost {
                                generation,
                                reason: e.to_string(),
                            });
                            break;
                        }
                    }
                }
            });

            *self.session.lock() = Some(Session { client, poll_task });
            Ok(generation)
        })
    }

    fn publish<'a>(
        &'a self,
        message: &'a PendingMessage,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let client = match &*self.session.lock() {
                Some(session) => session.client.clone(),
                None => return Err(TransportError::NotConnected),
            };

            client
                .publish(
                    message.topic.clone(),
                    message.qos.into(),
                    message.retain,
                    message.payload.clone(),
                )
                .await
                .map_err(|e| TransportError::Publish(e.to_string()))
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let session = self.session.lock().take();
            if let Some(session) = session {
                // Best effort; the poll task exits on its own once the
                // broker closes the stream, abort covers the rest.
                let _ = session.client.disconnect().await;
                session.poll_task.abort();
            }
            Ok(())
        })
    }
}
