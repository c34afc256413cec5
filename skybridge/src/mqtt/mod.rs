//! Broker connection core.
//!
//! This module owns the durable logical session to the MQTT broker:
//!
//! - [`ConnectionManager`] - the state machine, pending-message queue,
//!   reconnect-with-backoff policy and heartbeat/status reporting
//! - [`MqttTransport`] - the seam between the manager and the wire, with
//!   [`RumqttcTransport`] as the production implementation
//! - [`BackoffPolicy`] - exponential backoff shared by all reconnect paths
//!
//! # Architecture
//!
//! ```text
//! Publisher ──publish()──► ConnectionManager ──► MqttTransport ──► broker
//!                            │        ▲
//!                            │        └── TransportEvent channel
//!                            └── pending FIFO (drained on reconnect)
//! ```
//!
//! The transport's session I/O runs on its own task; unexpected disconnects
//! arrive on an explicit event channel and are translated into state-machine
//! transitions, never handled as ad hoc callbacks.

mod backoff;
pub(crate) mod manager;
mod transport;

use std::fmt;

use thiserror::Error;

pub use backoff::{
    BackoffPolicy, BackoffState, DEFAULT_INITIAL_DELAY_SECS, DEFAULT_MAX_CONNECT_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use manager::{ConnectionManager, PublishOutcome, SessionConfig};
pub use transport::{
    BoxFuture, MqttTransport, RumqttcTransport, TransportError, TransportEvent,
};

/// Delivery-guarantee level for a published message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered at least once; duplicates possible. The default, since
    /// retained state topics are idempotent.
    AtLeastOnce,
    /// Delivered exactly once.
    ExactlyOnce,
}

impl QosLevel {
    /// Parse the numeric QoS level used in configuration (0, 1 or 2).
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }
}

/// Lifecycle state of the logical broker session.
///
/// Owned exclusively by the [`ConnectionManager`]; no other component
/// mutates it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session. The initial state.
    #[default]
    Disconnected,
    /// A connection attempt is outstanding.
    Connecting,
    /// Session established; publishes are attempted immediately.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// A message held while the session is down, replayed FIFO on reconnect.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingMessage {
    /// Destination topic.
    pub topic: String,
    /// Serialized payload.
    pub payload: String,
    /// Delivery guarantee for this message.
    pub qos: QosLevel,
    /// Whether the broker should retain the message.
    pub retain: bool,
}

/// Broker deployment configuration.
#[derive(Clone, Debug)]
pub struct MqttConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Root of the published topic tree, without trailing slash.
    pub topic_prefix: String,
    /// Username, if the broker requires authentication.
    pub username: Option<String>,
    /// Password, if the broker requires authentication.
    pub password: Option<String>,
    /// Session-wide default QoS.
    pub qos: QosLevel,
    /// Session-wide default retain flag.
    pub retain: bool,
    /// Whether a credential rejection is fatal instead of retried.
    pub auth_fatal: bool,
}

/// Errors surfaced by the connection manager.
///
/// These are fatal-tier from the manager's perspective; whether the process
/// terminates is the driver loop's decision.
#[derive(Clone, Debug, Error)]
pub enum MqttError {
    /// A `connect()` invocation exhausted its bounded retry budget.
    #[error("Connection attempts exhausted after {attempts} tries")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The broker rejected the configured credentials and `auth_fatal`
    /// is enabled.
    #[error("Broker rejected credentials: {0}")]
    AuthRejected(String),

    /// Shutdown was requested while waiting to reconnect.
    #[error("Connection attempt cancelled by shutdown")]
    Cancelled,
}
