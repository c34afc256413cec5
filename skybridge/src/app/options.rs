//! Add-on options file loading.
//!
//! Home Assistant add-ons receive their user configuration as a JSON options
//! file (conventionally `/data/options.json`). `BridgeOptions` mirrors that
//! file one-to-one: every key is optional and falls back to the add-on's
//! documented default, so a missing or unreadable file degrades to a fully
//! default configuration instead of failing. Range and type *validation*
//! happens later in [`BridgeConfig::from_options`](super::BridgeConfig);
//! loading never rejects values.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::config::DEFAULT_POLL_INTERVAL_SECS;

/// A JSON value that may be a number or a numeric string.
///
/// The options file historically stored latitude/longitude as strings
/// (`"53.2707"`) while other installs write plain numbers; both shapes must
/// be accepted.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumberOrString {
    /// Plain JSON number.
    Number(f64),
    /// Number encoded as a string.
    Text(String),
}

impl NumberOrString {
    /// Interpret the value as a float, if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<&str> for NumberOrString {
    fn from(s: &str) -> Self {
        NumberOrString::Text(s.to_string())
    }
}

impl From<f64> for NumberOrString {
    fn from(n: f64) -> Self {
        NumberOrString::Number(n)
    }
}

/// Raw add-on options, prior to validation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Base URL of the aircraft tracking API.
    pub api_url: String,
    /// API query style: `point` (public path-style query) or `circle`
    /// (authenticated query-string request with an API key header).
    pub api_type: String,
    /// API key for `circle` mode. Ignored in `point` mode.
    pub api_key: String,
    /// Observer latitude in decimal degrees.
    pub latitude: NumberOrString,
    /// Observer longitude in decimal degrees.
    pub longitude: NumberOrString,
    /// Search radius around the observer, in nautical miles.
    pub radius: f64,
    /// Polling interval in seconds.
    pub update_interval: f64,
    /// MQTT broker hostname.
    pub mqtt_broker: String,
    /// MQTT broker port.
    pub mqtt_port: u16,
    /// Root of the published topic tree.
    pub mqtt_topic: String,
    /// MQTT username; empty means anonymous.
    pub mqtt_username: String,
    /// MQTT password; empty means anonymous.
    pub mqtt_password: String,
    /// Delivery guarantee for published messages (0, 1 or 2).
    pub mqtt_qos: u8,
    /// Whether published messages are retained by the broker.
    pub mqtt_retain: bool,
    /// Whether a broker credential rejection terminates the process
    /// instead of being retried with backoff.
    pub mqtt_auth_fatal: bool,
    /// What to publish: `summary`, `detailed` or `both`.
    pub tracking_mode: String,
    /// Whether an upstream fetch failure publishes a zero-aircraft summary
    /// (`true`) or leaves the last retained summary untouched (`false`).
    pub publish_empty_on_fetch_failure: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            api_url: "https://api.airplanes.live/v2/point".to_string(),
            api_type: "point".to_string(),
            api_key: String::new(),
            latitude: "53.2707".into(),
            longitude: "-9.0568".into(),
            radius: 50.0,
            update_interval: DEFAULT_POLL_INTERVAL_SECS as f64,
            mqtt_broker: "core-mosquitto".to_string(),
            mqtt_port: 1883,
            mqtt_topic: "airplanes/live".to_string(),
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            mqtt_qos: 1,
            mqtt_retain: true,
            mqtt_auth_fatal: false,
            tracking_mode: "summary".to_string(),
            publish_empty_on_fetch_failure: false,
        }
    }
}

impl BridgeOptions {
    /// Load options from a JSON file, falling back to defaults.
    ///
    /// A missing file is normal on first start and logs at warn level; a
    /// file that exists but fails to parse also degrades to defaults so the
    /// add-on still comes up (validation of individual values happens in
    /// `BridgeConfig::from_options`).
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(options) => {
                    info!("Loaded configuration from {}", path.display());
                    options
                }
                Err(e) => {
                    warn!(
                        "Error parsing configuration file {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    "Configuration file {} not readable ({}), using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}
