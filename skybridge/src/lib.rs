//! Skybridge - Live aircraft telemetry bridged into MQTT
//!
//! This library polls an aircraft-tracking REST API for traffic around a
//! configured observer position, reduces each batch of position reports into
//! a summary record, and republishes the results as retained messages on an
//! MQTT topic tree, including Home Assistant discovery metadata so that
//! downstream dashboards auto-configure themselves.
//!
//! # Architecture
//!
//! ```text
//! AircraftFetcher ──► summarize() ──► Publisher ──► ConnectionManager ──► broker
//!   (REST client)     (pure)          (topics &      (state machine,
//!                                      payloads)      queue, backoff)
//! ```
//!
//! The [`service::BridgeService`] driver loop runs one polling cycle at a
//! time; the broker session I/O runs on its own task inside the
//! [`mqtt::ConnectionManager`] so that disconnects and publish failures are
//! observed without blocking the polling cycle.

pub mod aggregate;
pub mod app;
pub mod coord;
pub mod fetch;
pub mod mqtt;
pub mod publish;
pub mod service;

pub use aggregate::{summarize, Observer, SummaryRecord};
pub use app::{AppError, BridgeConfig, BridgeOptions};
pub use fetch::{AircraftFetcher, AircraftRecord, FetchError};
pub use mqtt::{ConnectionManager, ConnectionState, PublishOutcome, QosLevel};
pub use publish::{Publisher, TrackingMode};
pub use service::BridgeService;
