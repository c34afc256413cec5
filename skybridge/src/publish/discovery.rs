//! Home Assistant MQTT discovery payloads.
//!
//! Discovery registrations are declarative, retained config messages under
//! `homeassistant/sensor/<unique_id>/config`. The consumer deduplicates by
//! `unique_id`, so resending a registration is idempotent. The fixed
//! summary sensors all read the one summary state topic through per-field
//! value templates and hang off a single bridge device; per-aircraft
//! sensors are registered as they are first observed and reference the
//! bridge device via `via_device`.

use serde_json::{json, Value};

/// Device identifier the summary sensors are grouped under.
pub const BRIDGE_DEVICE_ID: &str = "airplanes_live_device";

/// Display name of the bridge device.
pub const BRIDGE_DEVICE_NAME: &str = "Airplanes Live";

/// One fixed summary sensor exposed by the bridge.
pub struct SummarySensor {
    /// Human-readable sensor name.
    pub name: &'static str,
    /// Summary JSON key this sensor extracts; also used in unique ids.
    pub key: &'static str,
    /// Unit of measurement, if the value is dimensional.
    pub unit: Option<&'static str>,
    /// Home Assistant device class, if one applies.
    pub device_class: Option<&'static str>,
}

/// The fixed sensor set, registered once at startup.
pub const SUMMARY_SENSORS: &[SummarySensor] = &[
    SummarySensor {
        name: "Aircraft Count",
        key: "count",
        unit: None,
        device_class: None,
    },
    SummarySensor {
        name: "Closest Aircraft",
        key: "closest",
        unit: None,
        device_class: None,
    },
    SummarySensor {
        name: "Nearest Aircraft",
        key: "nearest",
        unit: None,
        device_class: None,
    },
    SummarySensor {
        name: "Highest Aircraft",
        key: "highest",
        unit: Some("ft"),
        device_class: None,
    },
    SummarySensor {
        name: "Fastest Aircraft (Ground)",
        key: "fastest_ground",
        unit: Some("kts"),
        device_class: Some("speed"),
    },
    SummarySensor {
        name: "Fastest Aircraft (Air)",
        key: "fastest_air",
        unit: Some("kts"),
        device_class: Some("speed"),
    },
    SummarySensor {
        name: "Aircraft Types",
        key: "aircraft_types",
        unit: None,
        device_class: None,
    },
    SummarySensor {
        name: "Weather Conditions",
        key: "weather",
        unit: None,
        device_class: None,
    },
    SummarySensor {
        name: "Last Update",
        key: "last_update",
        unit: None,
        device_class: Some("timestamp"),
    },
];

/// Unique id for a summary sensor.
pub fn summary_sensor_id(key: &str) -> String {
    format!("airplanes_live_{}", key)
}

/// Unique id for a per-aircraft sensor.
pub fn aircraft_sensor_id(hex: &str) -> String {
    format!("airplane_{}_info", hex)
}

/// Discovery config for one summary sensor.
pub fn summary_sensor_config(sensor: &SummarySensor, state_topic: &str) -> Value {
    let mut payload = json!({
        "name": sensor.name,
        "state_topic": state_topic,
        "unique_id": summary_sensor_id(sensor.key),
        "value_template": format!("{{{{ value_json.{} }}}}", sensor.key),
        "device": {
            "identifiers": [BRIDGE_DEVICE_ID],
            "name": BRIDGE_DEVICE_NAME,
            "manufacturer": "airplanes.live",
            "model": "Aircraft Tracker",
            "sw_version": env!("CARGO_PKG_VERSION"),
        },
    });
    if let Some(unit) = sensor.unit {
        payload["unit_of_measurement"] = json!(unit);
    }
    if let Some(class) = sensor.device_class {
        payload["device_class"] = json!(class);
    }
    payload
}

/// Discovery config for one tracked aircraft.
pub fn aircraft_config(hex: &str, model: Option<&str>, state_topic: &str) -> Value {
    json!({
        "name": format!("Aircraft {}", hex),
        "state_topic": state_topic,
        "unique_id": aircraft_sensor_id(hex),
        "value_template": "{{ value_json.flight }}",
        "device": {
            "identifiers": [format!("airplane_{}", hex)],
            "name": format!("Aircraft {}", hex),
            "manufacturer": "Unknown",
            "model": model.unwrap_or("Unknown"),
            "via_device": BRIDGE_DEVICE_ID,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_sensor_set_covers_all_summary_keys() {
        let keys: Vec<_> = SUMMARY_SENSORS.iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            vec![
                "count",
                "closest",
                "nearest",
                "highest",
                "fastest_ground",
                "fastest_air",
                "aircraft_types",
                "weather",
                "last_update",
            ]
        );
    }

    #[test]
    fn test_summary_sensor_config_layout() {
        let sensor = &SUMMARY_SENSORS[0];
        let config = summary_sensor_config(sensor, "airplanes/live/summary");

        assert_eq!(config["state_topic"], "airplanes/live/summary");
        assert_eq!(config["unique_id"], "airplanes_live_count");
        assert_eq!(config["value_template"], "{{ value_json.count }}");
        assert_eq!(config["device"]["identifiers"][0], BRIDGE_DEVICE_ID);
        // Count is dimensionless.
        assert!(config.get("unit_of_measurement").is_none());
    }

    #[test]
    fn test_summary_sensor_config_includes_unit_and_class() {
        let fastest = SUMMARY_SENSORS
            .iter()
            .find(|s| s.key == "fastest_ground")
            .unwrap();
        let config = summary_sensor_config(fastest, "airplanes/live/summary");
        assert_eq!(config["unit_of_measurement"], "kts");
        assert_eq!(config["device_class"], "speed");
    }

    #[test]
    fn test_aircraft_config_links_via_bridge_device() {
        let config = aircraft_config("abc123", Some("B738"), "airplanes/live/aircraft/abc123/state");
        assert_eq!(config["unique_id"], "airplane_abc123_info");
        assert_eq!(config["device"]["model"], "B738");
        assert_eq!(config["device"]["via_device"], BRIDGE_DEVICE_ID);

        let unknown = aircraft_config("abc123", None, "t");
        assert_eq!(unknown["device"]["model"], "Unknown");
    }
}
