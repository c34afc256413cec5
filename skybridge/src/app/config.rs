//! Validated bridge configuration.
//!
//! `BridgeConfig` combines the per-component configs (API client, MQTT
//! session, publishing mode, driver loop policy) into one immutable value
//! that is injected into each component's constructor. Nothing in the
//! library reads ambient global state.

use std::time::Duration;

use crate::fetch::{ApiConfig, ApiEndpoint, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::mqtt::{MqttConfig, QosLevel};
use crate::publish::TrackingMode;

use super::error::AppError;
use super::options::BridgeOptions;

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Complete validated bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Upstream API client configuration.
    pub api: ApiConfig,

    /// Broker session configuration.
    pub mqtt: MqttConfig,

    /// What to publish each cycle.
    pub tracking_mode: TrackingMode,

    /// Polling interval between fetch cycles.
    pub poll_interval: Duration,

    /// Fetch-failure policy: publish a zero-aircraft summary (`true`) or
    /// leave the previous retained summary authoritative (`false`).
    pub publish_empty_on_fetch_failure: bool,
}

impl BridgeConfig {
    /// Validate raw add-on options into a usable configuration.
    ///
    /// All range and type checks required before the driver loop starts
    /// happen here; any violation is fatal.
    pub fn from_options(options: &BridgeOptions) -> Result<Self, AppError> {
        let latitude = options
            .latitude
            .as_f64()
            .ok_or_else(|| AppError::Config(format!("invalid latitude: {:?}", options.latitude)))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::Config(format!(
                "latitude {} is out of range (-90 to 90)",
                latitude
            )));
        }

        let longitude = options.longitude.as_f64().ok_or_else(|| {
            AppError::Config(format!("invalid longitude: {:?}", options.longitude))
        })?;
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::Config(format!(
                "longitude {} is out of range (-180 to 180)",
                longitude
            )));
        }

        if !options.radius.is_finite() || options.radius <= 0.0 {
            return Err(AppError::Config(format!(
                "invalid radius: {} (must be a positive number)",
                options.radius
            )));
        }

        if !options.update_interval.is_finite() || options.update_interval < 1.0 {
            return Err(AppError::Config(format!(
                "invalid update interval: {} (must be >= 1)",
                options.update_interval
            )));
        }

        let qos = QosLevel::from_u8(options.mqtt_qos).ok_or_else(|| {
            AppError::Config(format!(
                "invalid mqtt_qos: {} (must be 0, 1 or 2)",
                options.mqtt_qos
            ))
        })?;

        let tracking_mode: TrackingMode = options.tracking_mode.parse().map_err(|_| {
            AppError::Config(format!(
                "invalid tracking_mode: {} (must be summary, detailed or both)",
                options.tracking_mode
            ))
        })?;

        let endpoint = match options.api_type.as_str() {
            "point" => ApiEndpoint::Point {
                base_url: options.api_url.trim_end_matches('/').to_string(),
            },
            "circle" => {
                if options.api_key.is_empty() {
                    return Err(AppError::Config(
                        "api_type 'circle' requires an api_key".to_string(),
                    ));
                }
                ApiEndpoint::Circle {
                    base_url: options.api_url.trim_end_matches('/').to_string(),
                    api_key: options.api_key.clone(),
                }
            }
            other => {
                return Err(AppError::Config(format!(
                    "invalid api_type: {} (must be point or circle)",
                    other
                )));
            }
        };

        let non_empty = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };

        Ok(Self {
            api: ApiConfig {
                endpoint,
                latitude,
                longitude,
                radius_nm: options.radius,
                timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            },
            mqtt: MqttConfig {
                host: options.mqtt_broker.clone(),
                port: options.mqtt_port,
                topic_prefix: options.mqtt_topic.trim_end_matches('/').to_string(),
                username: non_empty(&options.mqtt_username),
                password: non_empty(&options.mqtt_password),
                qos,
                retain: options.mqtt_retain,
                auth_fatal: options.mqtt_auth_fatal,
            },
            tracking_mode,
            poll_interval: Duration::from_secs_f64(options.update_interval),
            publish_empty_on_fetch_failure: options.publish_empty_on_fetch_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_validate() {
        let config = BridgeConfig::from_options(&BridgeOptions::default()).unwrap();
        assert_eq!(config.mqtt.host, "core-mosquitto");
        assert_eq!(config.mqtt.qos, QosLevel::AtLeastOnce);
        assert!(config.mqtt.retain);
        assert_eq!(config.tracking_mode, TrackingMode::Summary);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!((config.api.latitude - 53.2707).abs() < 1e-9);
    }

    #[test]
    fn test_latitude_out_of_range_is_rejected() {
        let options = BridgeOptions {
            latitude: 91.0.into(),
            ..BridgeOptions::default()
        };
        let err = BridgeConfig::from_options(&options).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_unparseable_latitude_is_rejected() {
        let options = BridgeOptions {
            latitude: "galway".into(),
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());
    }

    #[test]
    fn test_longitude_out_of_range_is_rejected() {
        let options = BridgeOptions {
            longitude: (-200.0).into(),
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());
    }

    #[test]
    fn test_non_positive_radius_is_rejected() {
        let options = BridgeOptions {
            radius: 0.0,
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());
    }

    #[test]
    fn test_sub_second_interval_is_rejected() {
        let options = BridgeOptions {
            update_interval: 0.5,
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());
    }

    #[test]
    fn test_unrecognized_qos_is_rejected() {
        let options = BridgeOptions {
            mqtt_qos: 3,
            ..BridgeOptions::default()
        };
        let err = BridgeConfig::from_options(&options).unwrap_err();
        assert!(err.to_string().contains("mqtt_qos"));
    }

    #[test]
    fn test_unrecognized_tracking_mode_is_rejected() {
        let options = BridgeOptions {
            tracking_mode: "firehose".to_string(),
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());
    }

    #[test]
    fn test_circle_mode_requires_api_key() {
        let options = BridgeOptions {
            api_type: "circle".to_string(),
            ..BridgeOptions::default()
        };
        assert!(BridgeConfig::from_options(&options).is_err());

        let options = BridgeOptions {
            api_type: "circle".to_string(),
            api_key: "secret".to_string(),
            ..BridgeOptions::default()
        };
        let config = BridgeConfig::from_options(&options).unwrap();
        assert!(matches!(config.api.endpoint, ApiEndpoint::Circle { .. }));
    }

    #[test]
    fn test_empty_credentials_mean_anonymous() {
        let config = BridgeConfig::from_options(&BridgeOptions::default()).unwrap();
        assert!(config.mqtt.username.is_none());
        assert!(config.mqtt.password.is_none());
    }
}
