//! Bridge driver loop.
//!
//! `BridgeService` coordinates the startup, polling cycle, and shutdown of
//! the bridge: on a fixed interval it fetches aircraft, aggregates them
//! into a summary, and publishes through the connection manager, whose
//! heartbeat/event task runs concurrently on its own spawned task.
//!
//! # Startup sequence
//!
//! 1. Initial broker connection (failure degrades to queueing, it does not
//!    abort startup unless authentication is configured as fatal)
//! 2. Connection manager heartbeat task spawned
//! 3. Discovery registrations for the summary sensors
//! 4. Initial empty retained summary so registered sensors have state
//! 5. Polling loop until cancellation
//!
//! Termination always flows through `ConnectionManager::shutdown()` so the
//! retained "offline" status is attempted on every exit path.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate::{empty_summary, summarize, Observer};
use crate::app::{AppError, BridgeConfig};
use crate::fetch::AircraftFetcher;
use crate::mqtt::{ConnectionManager, MqttError, RumqttcTransport, SessionConfig};
use crate::publish::Publisher;

/// Client identifier presented to the broker.
const MQTT_CLIENT_ID: &str = "skybridge";

/// Orchestrates fetch → aggregate → publish on a fixed interval.
pub struct BridgeService {
    fetcher: Arc<AircraftFetcher>,
    publisher: Publisher,
    manager: Arc<ConnectionManager>,
    observer: Observer,
    poll_interval: std::time::Duration,
    publish_empty_on_fetch_failure: bool,
    cancellation: CancellationToken,
}

impl BridgeService {
    /// Build the full production service from validated configuration.
    pub fn new(config: &BridgeConfig, cancellation: CancellationToken) -> Result<Self, AppError> {
        let fetcher = Arc::new(AircraftFetcher::new(config.api.clone())?);

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = Arc::new(RumqttcTransport::new(
            config.mqtt.clone(),
            MQTT_CLIENT_ID,
            event_tx,
        ));
        let manager = Arc::new(ConnectionManager::new(
            transport,
            event_rx,
            SessionConfig::from_mqtt(&config.mqtt),
            cancellation.clone(),
        ));

        Ok(Self::with_components(config, fetcher, manager, cancellation))
    }

    /// Assemble a service from pre-built components (used by tests to
    /// inject mock transports and HTTP clients).
    pub fn with_components(
        config: &BridgeConfig,
        fetcher: Arc<AircraftFetcher>,
        manager: Arc<ConnectionManager>,
        cancellation: CancellationToken,
    ) -> Self {
        let publisher = Publisher::new(
            manager.clone(),
            &config.mqtt.topic_prefix,
            config.tracking_mode,
        );
        Self {
            fetcher,
            publisher,
            manager,
            observer: Observer {
                latitude: config.api.latitude,
                longitude: config.api.longitude,
            },
            poll_interval: config.poll_interval,
            publish_empty_on_fetch_failure: config.publish_empty_on_fetch_failure,
            cancellation,
        }
    }

    /// Run until cancellation.
    pub async fn run(mut self) -> Result<(), AppError> {
        match self.manager.connect().await {
            Ok(()) => {}
            Err(e @ MqttError::AuthRejected(_)) => {
                // Only surfaced when authentication failures are
                // configured as fatal.
                self.manager.shutdown().await;
                return Err(AppError::Broker(e));
            }
            Err(MqttError::Cancelled) => {
                self.manager.shutdown().await;
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Starting without broker connection ({}); messages will queue until the heartbeat reconnects",
                    e
                );
            }
        }

        let session = self.manager.clone();
        let session_task = tokio::spawn(async move { session.run().await });

        self.publisher.announce_discovery().await;
        self.publisher
            .publish_summary(&empty_summary(Utc::now()))
            .await;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                _ = ticker.tick() => self.run_cycle().await,
            }
        }

        info!("Stopping bridge");
        self.manager.shutdown().await;
        let _ = session_task.await;
        Ok(())
    }

    /// One fetch → aggregate → publish cycle.
    ///
    /// Fetch failures follow the configured policy: either no summary
    /// update for the cycle (the previous retained message stays
    /// authoritative) or an explicit zero-aircraft summary.
    async fn run_cycle(&mut self) {
        let fetcher = self.fetcher.clone();
        let fetched = tokio::task::spawn_blocking(move || fetcher.fetch()).await;

        match fetched {
            Ok(Ok(records)) => {
                let now = Utc::now();
                let summary = summarize(&records, self.observer, now);
                self.publisher.publish_summary(&summary).await;
                self.publisher.publish_aircraft(&records, now).await;
            }
            Ok(Err(e)) => {
                if self.publish_empty_on_fetch_failure {
                    warn!("Fetch failed ({}); publishing empty summary", e);
                    self.publisher
                        .publish_summary(&empty_summary(Utc::now()))
                        .await;
                } else {
                    warn!("Fetch failed ({}); keeping previous retained summary", e);
                }
            }
            Err(e) => {
                // Panic inside the fetch task; skip the cycle, keep looping.
                error!("Fetch task failed unexpectedly: {}", e);
            }
        }
    }
}
