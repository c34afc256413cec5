//! Aircraft record and fetch error types.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// One aircraft position report from the upstream API.
///
/// Only the transponder hex code is expected to be present; every other
/// field may be absent or malformed. Numeric fields tolerate the API's
/// habit of mixing JSON numbers with numeric strings (and the occasional
/// `"ground"` altitude): anything unparseable deserializes to `None`
/// rather than failing the record.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AircraftRecord {
    /// Transponder hex code, the stable identifier for the aircraft.
    #[serde(default)]
    pub hex: Option<String>,

    /// Flight callsign, typically padded with trailing spaces.
    #[serde(default)]
    pub flight: Option<String>,

    /// Barometric altitude in feet.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub alt_baro: Option<f64>,

    /// Ground speed in knots.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gs: Option<f64>,

    /// True airspeed in knots.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tas: Option<f64>,

    /// Indicated airspeed in knots.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ias: Option<f64>,

    /// Track heading in degrees.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub track: Option<f64>,

    /// Latitude in decimal degrees.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lon: Option<f64>,

    /// ICAO aircraft type code (e.g. "B738").
    #[serde(default, rename = "t")]
    pub aircraft_type: Option<String>,

    /// Wind direction in degrees, as observed by the aircraft.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wd: Option<f64>,

    /// Wind speed in knots.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ws: Option<f64>,

    /// Outside air temperature in degrees Celsius.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub oat: Option<f64>,
}

impl AircraftRecord {
    /// Callsign with padding removed, if one is present and non-empty.
    pub fn callsign(&self) -> Option<&str> {
        self.flight
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Best available airspeed: true airspeed, falling back to indicated.
    pub fn airspeed(&self) -> Option<f64> {
        self.tas.or(self.ias)
    }

    /// Best available speed for display: ground speed, then airspeed.
    pub fn display_speed(&self) -> Option<f64> {
        self.gs.or_else(|| self.airspeed())
    }
}

/// Deserialize a field that may be a number, a numeric string, or garbage.
///
/// Parse failure is indistinguishable from absence by design: both mean
/// "unknown" and exclude the record from that statistic.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Errors that can occur while fetching aircraft data.
///
/// All variants are recoverable at the cycle boundary: the driver loop
/// treats any of them as "no data this cycle".
#[derive(Clone, Debug, Error)]
pub enum FetchError {
    /// The request exceeded the configured timeout.
    #[error("API request timed out")]
    Timeout,

    /// Transport-level failure reaching the API.
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-success HTTP status.
    #[error("API HTTP error: status {0}")]
    Status(u16),

    /// The response body was not valid JSON.
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// The response was valid JSON but not the expected shape.
    #[error("Unexpected API response format: {0}")]
    Shape(String),
}
