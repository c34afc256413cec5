//! Payload formatting and publishing.
//!
//! Translates a [`SummaryRecord`] (and, in detailed mode, each
//! [`AircraftRecord`]) into topic/payload pairs and submits them through
//! the [`ConnectionManager`]. Everything is published retained: the broker
//! keeps the last state for each topic, so late subscribers see current
//! data immediately and polling gaps do not blank the dashboard.
//!
//! # Topic tree
//!
//! ```text
//! <prefix>/summary                    retained summary JSON
//! <prefix>/aircraft/<hex>/state       retained per-aircraft state
//! <prefix>/status                     online/offline liveness
//! homeassistant/sensor/<id>/config    discovery registrations
//! ```

mod discovery;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::aggregate::SummaryRecord;
use crate::fetch::AircraftRecord;
use crate::mqtt::ConnectionManager;

pub use discovery::{
    aircraft_config, summary_sensor_config, SummarySensor, BRIDGE_DEVICE_ID, BRIDGE_DEVICE_NAME,
    SUMMARY_SENSORS,
};

/// Discovery topic root used by Home Assistant.
const HA_DISCOVERY_PREFIX: &str = "homeassistant";

/// What the bridge publishes each cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackingMode {
    /// Only the aggregate summary.
    #[default]
    Summary,
    /// Only per-aircraft state topics.
    Detailed,
    /// Summary plus per-aircraft state.
    Both,
}

impl TrackingMode {
    /// Whether the aggregate summary is published.
    pub fn includes_summary(self) -> bool {
        matches!(self, TrackingMode::Summary | TrackingMode::Both)
    }

    /// Whether per-aircraft state topics are published.
    pub fn includes_detailed(self) -> bool {
        matches!(self, TrackingMode::Detailed | TrackingMode::Both)
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Summary => write!(f, "summary"),
            TrackingMode::Detailed => write!(f, "detailed"),
            TrackingMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for TrackingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(TrackingMode::Summary),
            "detailed" => Ok(TrackingMode::Detailed),
            "both" => Ok(TrackingMode::Both),
            _ => Err(()),
        }
    }
}

/// Topic layout rooted at the configured prefix.
#[derive(Clone, Debug)]
pub struct TopicTree {
    prefix: String,
}

impl TopicTree {
    /// Create a tree rooted at `prefix` (no trailing slash).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Summary state topic.
    pub fn summary(&self) -> String {
        format!("{}/summary", self.prefix)
    }

    /// Liveness status topic.
    pub fn status(&self) -> String {
        format!("{}/status", self.prefix)
    }

    /// State topic for one aircraft.
    pub fn aircraft_state(&self, hex: &str) -> String {
        format!("{}/aircraft/{}/state", self.prefix, hex)
    }

    /// Discovery config topic for a summary sensor.
    pub fn summary_discovery(key: &str) -> String {
        format!(
            "{}/sensor/airplanes_live_{}/config",
            HA_DISCOVERY_PREFIX, key
        )
    }

    /// Discovery config topic for one aircraft.
    pub fn aircraft_discovery(hex: &str) -> String {
        format!(
            "{}/sensor/airplane_{}_info/config",
            HA_DISCOVERY_PREFIX, hex
        )
    }
}

/// Formats and submits payloads through the connection manager.
pub struct Publisher {
    manager: Arc<ConnectionManager>,
    topics: TopicTree,
    mode: TrackingMode,
    /// Hex codes already given a discovery registration this process.
    seen_hexes: HashSet<String>,
}

impl Publisher {
    /// Create a publisher over the given manager and topic prefix.
    pub fn new(manager: Arc<ConnectionManager>, topic_prefix: &str, mode: TrackingMode) -> Self {
        Self {
            manager,
            topics: TopicTree::new(topic_prefix),
            mode,
            seen_hexes: HashSet::new(),
        }
    }

    /// Register the fixed summary sensors. Called once at startup;
    /// idempotent if resent since consumers deduplicate by unique id.
    pub async fn announce_discovery(&self) {
        info!("Publishing discovery registrations for summary sensors");
        let state_topic = self.topics.summary();
        for sensor in SUMMARY_SENSORS {
            let topic = TopicTree::summary_discovery(sensor.key);
            let payload = summary_sensor_config(sensor, &state_topic).to_string();
            self.manager
                .publish(&topic, payload, None, Some(true))
                .await;
        }
    }

    /// Publish the cycle summary, retained.
    pub async fn publish_summary(&self, summary: &SummaryRecord) {
        if !self.mode.includes_summary() {
            return;
        }
        // Serialization of a plain struct with string/number fields cannot
        // fail; unwrap_or_default keeps the publish path infallible anyway.
        let payload = serde_json::to_string(summary).unwrap_or_default();
        self.manager
            .publish(&self.topics.summary(), payload, None, Some(true))
            .await;
        info!(
            "Published summary: {} aircraft, closest: {}, types: {}",
            summary.count, summary.closest, summary.aircraft_types
        );
    }

    /// Publish per-aircraft state topics, with a one-time discovery
    /// registration for each newly observed hex code.
    pub async fn publish_aircraft(&mut self, records: &[AircraftRecord], now: DateTime<Utc>) {
        if !self.mode.includes_detailed() || records.is_empty() {
            return;
        }

        debug!("Publishing individual state for {} aircraft", records.len());
        for record in records {
            let Some(hex) = record.hex.as_deref() else {
                // A record without a transponder code has no stable topic.
                continue;
            };

            let state_topic = self.topics.aircraft_state(hex);
            let state = json!({
                "hex": hex,
                "flight": record.callsign().unwrap_or("Unknown"),
                "altitude": record.alt_baro,
                "speed": record.display_speed(),
                "track": record.track,
                "lat": record.lat,
                "lon": record.lon,
                "last_seen": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            });
            self.manager
                .publish(&state_topic, state.to_string(), None, Some(true))
                .await;

            if self.seen_hexes.insert(hex.to_string()) {
                let config =
                    aircraft_config(hex, record.aircraft_type.as_deref(), &state_topic);
                self.manager
                    .publish(
                        &TopicTree::aircraft_discovery(hex),
                        config.to_string(),
                        None,
                        Some(true),
                    )
                    .await;
            }
        }
    }
}
