//! Summary aggregation.
//!
//! Pure reduction of an aircraft sequence into one [`SummaryRecord`] per
//! polling cycle. No history is retained: each record fully supersedes the
//! previous one, which is why the publisher sends it retained.
//!
//! All statistics are computed over the subset of records with usable
//! values for that statistic; malformed or missing values shrink the
//! candidate set but never abort the aggregation. Ties are broken by input
//! order (the first minimal/maximal record wins), so identical input always
//! produces an identical summary.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::coord::haversine_km;
use crate::fetch::AircraftRecord;

/// Sentinel for descriptor fields when the input sequence is empty.
const NONE_SENTINEL: &str = "None";

/// Sentinel for fields where no record qualified.
const UNKNOWN_SENTINEL: &str = "Unknown";

/// Observer position the radius query is centered on.
#[derive(Clone, Copy, Debug)]
pub struct Observer {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Per-cycle summary of the observed aircraft, as published.
///
/// Field names are the JSON keys consumed by existing dashboards; `closest`
/// is the lowest-altitude aircraft (the historical meaning of the key),
/// `nearest` is nearest by great-circle distance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRecord {
    /// Number of aircraft in the input sequence.
    pub count: usize,
    /// Lowest-altitude aircraft descriptor.
    pub closest: String,
    /// Nearest-by-distance aircraft descriptor.
    pub nearest: String,
    /// Highest barometric altitude in feet (0 if unknown).
    pub highest: f64,
    /// Fastest ground speed in knots (0 if unknown).
    pub fastest_ground: f64,
    /// Fastest airspeed in knots (0 if unknown).
    pub fastest_air: f64,
    /// Distinct aircraft type codes in first-seen order, comma-joined.
    pub aircraft_types: String,
    /// Weather snapshot from the first reporting aircraft.
    pub weather: String,
    /// When this summary was computed (RFC 3339).
    pub last_update: String,
}

/// The zero-aircraft summary.
///
/// Published at startup so discovery has an initial state, and per cycle
/// when a fetch fails and the empty-on-failure policy is enabled.
pub fn empty_summary(now: DateTime<Utc>) -> SummaryRecord {
    SummaryRecord {
        count: 0,
        closest: NONE_SENTINEL.to_string(),
        nearest: NONE_SENTINEL.to_string(),
        highest: 0.0,
        fastest_ground: 0.0,
        fastest_air: 0.0,
        aircraft_types: UNKNOWN_SENTINEL.to_string(),
        weather: UNKNOWN_SENTINEL.to_string(),
        last_update: timestamp(now),
    }
}

/// Reduce an aircraft sequence into a summary.
///
/// Deterministic: identical input order yields an identical record (given
/// the same `now`).
pub fn summarize(
    records: &[AircraftRecord],
    observer: Observer,
    now: DateTime<Utc>,
) -> SummaryRecord {
    if records.is_empty() {
        return empty_summary(now);
    }

    SummaryRecord {
        count: records.len(),
        closest: lowest_altitude(records),
        nearest: nearest_by_distance(records, observer),
        highest: max_over(records, |r| r.alt_baro),
        fastest_ground: max_over(records, |r| r.gs),
        fastest_air: max_over(records, |r| r.airspeed()),
        aircraft_types: aircraft_types(records),
        weather: weather_snapshot(records),
        last_update: timestamp(now),
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn display_name(record: &AircraftRecord) -> &str {
    record.callsign().unwrap_or(UNKNOWN_SENTINEL)
}

/// Descriptor of the record with the minimum parseable altitude.
///
/// Falls back to the first record's callsign when no altitude in the
/// sequence is usable.
fn lowest_altitude(records: &[AircraftRecord]) -> String {
    let lowest = records
        .iter()
        .filter_map(|r| r.alt_baro.map(|alt| (r, alt)))
        // Strict comparison keeps the first minimal record on ties.
        .reduce(|best, candidate| if candidate.1 < best.1 { candidate } else { best });

    match lowest {
        Some((record, alt)) => format!("{} ({}ft)", display_name(record), alt),
        None => display_name(&records[0]).to_string(),
    }
}

/// Descriptor of the record nearest to the observer by haversine distance.
fn nearest_by_distance(records: &[AircraftRecord], observer: Observer) -> String {
    let nearest = records
        .iter()
        .filter_map(|r| match (r.lat, r.lon) {
            (Some(lat), Some(lon)) => Some((
                r,
                haversine_km(observer.latitude, observer.longitude, lat, lon),
            )),
            _ => None,
        })
        .reduce(|best, candidate| if candidate.1 < best.1 { candidate } else { best });

    match nearest {
        Some((record, distance)) => format!("{} ({:.1} km)", display_name(record), distance),
        None => UNKNOWN_SENTINEL.to_string(),
    }
}

/// Maximum of a numeric field over the records that report it, 0 if none.
fn max_over(records: &[AircraftRecord], field: impl Fn(&AircraftRecord) -> Option<f64>) -> f64 {
    records
        .iter()
        .filter_map(field)
        .fold(None::<f64>, |best, v| match best {
            // Strictly-greater keeps the first maximal element on ties.
            Some(b) if v > b => Some(v),
            Some(b) => Some(b),
            None => Some(v),
        })
        .unwrap_or(0.0)
}

/// Distinct non-empty type codes in first-seen order, comma-joined.
fn aircraft_types(records: &[AircraftRecord]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for record in records {
        if let Some(code) = record.aircraft_type.as_deref() {
            let code = code.trim();
            if !code.is_empty() && !seen.contains(&code) {
                seen.push(code);
            }
        }
    }

    if seen.is_empty() {
        UNKNOWN_SENTINEL.to_string()
    } else {
        seen.join(", ")
    }
}

/// Weather string from the first record exposing any weather field.
fn weather_snapshot(records: &[AircraftRecord]) -> String {
    for record in records {
        if record.wd.is_none() && record.ws.is_none() && record.oat.is_none() {
            continue;
        }

        let mut parts = Vec::new();
        if let Some(wd) = record.wd {
            parts.push(format!("Wind: {}°", wd));
        }
        if let Some(ws) = record.ws {
            parts.push(format!("{}kts", ws));
        }
        if let Some(oat) = record.oat {
            parts.push(format!("Temp: {}°C", oat));
        }
        return parts.join(" | ");
    }

    UNKNOWN_SENTINEL.to_string()
}
