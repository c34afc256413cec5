//! Integration tests for the publish path across broker outages.
//!
//! These tests drive the public `Publisher` + `ConnectionManager` pipeline
//! against a scripted transport and verify:
//! - messages produced while offline are queued, not dropped
//! - reconnection replays the queue in FIFO order before new traffic
//! - the retained topic layout seen by a broker subscriber
//!
//! Run with: `cargo test --test bridge_queue`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use skybridge::aggregate::{summarize, Observer};
use skybridge::mqtt::{
    BackoffPolicy, BoxFuture, ConnectionManager, ConnectionState, MqttTransport, PendingMessage,
    PublishOutcome, QosLevel, SessionConfig, TransportError,
};
use skybridge::publish::Publisher;
use skybridge::{AircraftRecord, TrackingMode};

/// Transport that can be flipped between reachable and unreachable.
struct FlakyTransport {
    reachable: Mutex<bool>,
    connect_failures: Mutex<VecDeque<TransportError>>,
    published: Mutex<Vec<PendingMessage>>,
    generation: AtomicU64,
}

impl FlakyTransport {
    fn new() -> Self {
        Self {
            reachable: Mutex::new(true),
            connect_failures: Mutex::new(VecDeque::new()),
            published: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().unwrap() = reachable;
    }

    fn script_connect_failures(&self, failures: Vec<TransportError>) {
        *self.connect_failures.lock().unwrap() = failures.into();
    }

    fn published_topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.topic.clone())
            .collect()
    }
}

impl MqttTransport for FlakyTransport {
    fn connect(&self) -> BoxFuture<'_, Result<u64, TransportError>> {
        Box::pin(async move {
            if let Some(err) = self.connect_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            if *self.reachable.lock().unwrap() {
                Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
            } else {
                Err(TransportError::Connect("broker unreachable".to_string()))
            }
        })
    }

    fn publish<'a>(
        &'a self,
        message: &'a PendingMessage,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if !*self.reachable.lock().unwrap() {
                return Err(TransportError::Publish("connection reset".to_string()));
            }
            self.published.lock().unwrap().push(message.clone());
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { Ok(()) })
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        status_topic: "airplanes/live/status".to_string(),
        default_qos: QosLevel::AtLeastOnce,
        default_retain: true,
        auth_fatal: false,
        heartbeat_interval: Duration::from_secs(30),
        connect_timeout: Duration::from_secs(1),
        shutdown_timeout: Duration::from_secs(1),
        backoff: BackoffPolicy {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 3,
        },
    }
}

fn manager_over(transport: Arc<FlakyTransport>) -> Arc<ConnectionManager> {
    let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
    Arc::new(ConnectionManager::new(
        transport,
        rx,
        session_config(),
        CancellationToken::new(),
    ))
}

fn record(hex: &str, gs: f64) -> AircraftRecord {
    AircraftRecord {
        hex: Some(hex.to_string()),
        flight: Some(hex.to_uppercase()),
        gs: Some(gs),
        ..AircraftRecord::default()
    }
}

#[tokio::test]
async fn test_outage_queues_cycles_and_replays_them_in_order() {
    let transport = Arc::new(FlakyTransport::new());
    let manager = manager_over(transport.clone());
    let publisher = Publisher::new(manager.clone(), "airplanes/live", TrackingMode::Summary);

    manager.connect().await.unwrap();
    transport.published.lock().unwrap().clear();

    let observer = Observer {
        latitude: 53.2707,
        longitude: -9.0568,
    };
    let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();

    // Two cycles while the broker is down: the first publish failure demotes
    // the session, the second cycle queues directly.
    transport.set_reachable(false);
    publisher
        .publish_summary(&summarize(&[record("aaa111", 400.0)], observer, now))
        .await;
    publisher
        .publish_summary(&summarize(&[record("bbb222", 410.0)], observer, now))
        .await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.queued_len(), 2);

    // Broker comes back; reconnect replays both summaries, oldest first,
    // before the online status.
    transport.set_reachable(true);
    manager.connect().await.unwrap();

    let topics = transport.published_topics();
    assert_eq!(
        topics,
        vec![
            "airplanes/live/summary",
            "airplanes/live/summary",
            "airplanes/live/status",
        ]
    );
    let published = transport.published.lock().unwrap().clone();
    assert!(published[0].payload.contains("AAA111"));
    assert!(published[1].payload.contains("BBB222"));
    assert_eq!(manager.queued_len(), 0);
}

#[tokio::test]
async fn test_connect_retries_through_transient_failures() {
    let transport = Arc::new(FlakyTransport::new());
    transport.script_connect_failures(vec![
        TransportError::Connect("refused".to_string()),
        TransportError::Connect("refused".to_string()),
    ]);
    let manager = manager_over(transport.clone());

    // Third attempt succeeds within the bound of three.
    manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_publish_after_reconnect_goes_straight_through() {
    let transport = Arc::new(FlakyTransport::new());
    let manager = manager_over(transport.clone());
    manager.connect().await.unwrap();

    let outcome = manager
        .publish("airplanes/live/summary", "{}", None, None)
        .await;
    assert_eq!(outcome, PublishOutcome::Sent);
    assert_eq!(manager.queued_len(), 0);
}

#[tokio::test]
async fn test_detailed_cycle_publishes_state_and_discovery_once() {
    let transport = Arc::new(FlakyTransport::new());
    let manager = manager_over(transport.clone());
    let mut publisher = Publisher::new(manager.clone(), "airplanes/live", TrackingMode::Both);

    manager.connect().await.unwrap();
    transport.published.lock().unwrap().clear();

    let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();
    let fleet = [record("aaa111", 400.0)];
    publisher.publish_aircraft(&fleet, now).await;
    publisher.publish_aircraft(&fleet, now).await;

    let topics = transport.published_topics();
    assert_eq!(
        topics
            .iter()
            .filter(|t| *t == "airplanes/live/aircraft/aaa111/state")
            .count(),
        2
    );
    assert_eq!(
        topics
            .iter()
            .filter(|t| *t == "homeassistant/sensor/airplane_aaa111_info/config")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_shutdown_publishes_retained_offline_status() {
    let transport = Arc::new(FlakyTransport::new());
    let manager = manager_over(transport.clone());
    manager.connect().await.unwrap();

    manager.shutdown().await;

    let published = transport.published.lock().unwrap().clone();
    let last = published.last().unwrap();
    assert_eq!(last.topic, "airplanes/live/status");
    assert!(last.payload.contains("offline"));
    assert!(last.retain);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}
