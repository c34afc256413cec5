//! Aircraft data fetcher.
//!
//! Calls the external tracking API, normalizes the response shape, and
//! returns an ordered sequence of [`AircraftRecord`]s or a typed
//! [`FetchError`]. The client is synchronous (reqwest blocking, as
//! configured crate-wide) and is driven through `spawn_blocking` by the
//! async driver loop.
//!
//! Two query styles are supported:
//!
//! - **Point** (public API): `GET {base}/{lat}/{lon}/{radius}`
//! - **Circle** (authenticated): `GET {base}?lat={lat}&lon={lon}&dist={radius}`
//!   with the key in an `X-API-Key` header.
//!
//! The response is expected to be a JSON object with the aircraft array
//! under `aircraft` or the legacy `ac` key; anything else is a
//! [`FetchError::Shape`]. Individual array elements that fail to parse are
//! skipped, never fatal.

pub(crate) mod http;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

pub use http::{HttpClient, ReqwestClient, API_KEY_HEADER};
pub use types::{AircraftRecord, FetchError};

/// Default upstream request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// How the upstream API is queried.
#[derive(Clone, Debug)]
pub enum ApiEndpoint {
    /// Public path-style point query.
    Point {
        /// Base URL, e.g. `https://api.airplanes.live/v2/point`.
        base_url: String,
    },

    /// Authenticated circle query with an API-key header.
    Circle {
        /// Base URL of the circle endpoint.
        base_url: String,
        /// API key sent with every request.
        api_key: String,
    },
}

/// Upstream API client configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Endpoint and query style.
    pub endpoint: ApiEndpoint,
    /// Observer latitude in decimal degrees.
    pub latitude: f64,
    /// Observer longitude in decimal degrees.
    pub longitude: f64,
    /// Search radius in nautical miles.
    pub radius_nm: f64,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Fetches aircraft around the configured observer position.
pub struct AircraftFetcher {
    client: Arc<dyn HttpClient>,
    config: ApiConfig,
}

impl AircraftFetcher {
    /// Create a fetcher backed by a real HTTP client.
    pub fn new(config: ApiConfig) -> Result<Self, FetchError> {
        let client = Arc::new(ReqwestClient::with_timeout(config.timeout)?);
        Ok(Self { client, config })
    }

    /// Create a fetcher with an injected HTTP client (used by tests).
    pub fn with_client(config: ApiConfig, client: Arc<dyn HttpClient>) -> Self {
        Self { client, config }
    }

    /// The request URL for the configured endpoint and observer.
    pub fn request_url(&self) -> String {
        match &self.config.endpoint {
            ApiEndpoint::Point { base_url } => format!(
                "{}/{}/{}/{}",
                base_url, self.config.latitude, self.config.longitude, self.config.radius_nm
            ),
            ApiEndpoint::Circle { base_url, .. } => format!(
                "{}?lat={}&lon={}&dist={}",
                base_url, self.config.latitude, self.config.longitude, self.config.radius_nm
            ),
        }
    }

    /// Fetch the current aircraft list.
    ///
    /// Returns records in the order the API reported them; downstream
    /// tie-breaking depends on this order being preserved.
    pub fn fetch(&self) -> Result<Vec<AircraftRecord>, FetchError> {
        let url = self.request_url();
        let api_key = match &self.config.endpoint {
            ApiEndpoint::Point { .. } => None,
            ApiEndpoint::Circle { api_key, .. } => Some(api_key.as_str()),
        };

        debug!("Fetching aircraft data from {}", url);
        let body = self.client.get(&url, api_key)?;

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let list = value
            .get("aircraft")
            .or_else(|| value.get("ac"))
            .ok_or_else(|| {
                FetchError::Shape("missing 'aircraft'/'ac' key in response".to_string())
            })?;

        let entries = list
            .as_array()
            .ok_or_else(|| FetchError::Shape("'aircraft' key is not an array".to_string()))?;

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries {
            match serde_json::from_value::<AircraftRecord>(entry.clone()) {
                Ok(record) => records.push(record),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("Skipped {} malformed aircraft entries", skipped);
        }
        debug!("Fetched {} aircraft", records.len());

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::http::tests::MockHttpClient;
    use super::*;

    fn point_config() -> ApiConfig {
        ApiConfig {
            endpoint: ApiEndpoint::Point {
                base_url: "https://api.example.com/v2/point".to_string(),
            },
            latitude: 53.2707,
            longitude: -9.0568,
            radius_nm: 50.0,
            timeout: Duration::from_secs(15),
        }
    }

    fn fetcher_with_body(body: &str) -> AircraftFetcher {
        AircraftFetcher::with_client(
            point_config(),
            Arc::new(MockHttpClient {
                response: Ok(body.as_bytes().to_vec()),
            }),
        )
    }

    #[test]
    fn test_point_url_layout() {
        let fetcher = AircraftFetcher::with_client(
            point_config(),
            Arc::new(MockHttpClient {
                response: Ok(vec![]),
            }),
        );
        assert_eq!(
            fetcher.request_url(),
            "https://api.example.com/v2/point/53.2707/-9.0568/50"
        );
    }

    #[test]
    fn test_circle_url_layout() {
        let config = ApiConfig {
            endpoint: ApiEndpoint::Circle {
                base_url: "https://api.example.com/circle".to_string(),
                api_key: "secret".to_string(),
            },
            ..point_config()
        };
        let fetcher = AircraftFetcher::with_client(
            config,
            Arc::new(MockHttpClient {
                response: Ok(vec![]),
            }),
        );
        assert_eq!(
            fetcher.request_url(),
            "https://api.example.com/circle?lat=53.2707&lon=-9.0568&dist=50"
        );
    }

    #[test]
    fn test_fetch_reads_aircraft_key() {
        let fetcher = fetcher_with_body(r#"{"aircraft":[{"hex":"abc123"},{"hex":"def456"}]}"#);
        let records = fetcher.fetch().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hex.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_fetch_reads_legacy_ac_key() {
        let fetcher = fetcher_with_body(r#"{"ac":[{"hex":"abc123"}]}"#);
        let records = fetcher.fetch().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_fetch_preserves_input_order() {
        let fetcher = fetcher_with_body(r#"{"ac":[{"hex":"b"},{"hex":"a"},{"hex":"c"}]}"#);
        let records = fetcher.fetch().unwrap();
        let hexes: Vec<_> = records.iter().filter_map(|r| r.hex.as_deref()).collect();
        assert_eq!(hexes, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_fetch_missing_key_is_shape_error() {
        let fetcher = fetcher_with_body(r#"{"now": 1700000000}"#);
        assert!(matches!(fetcher.fetch(), Err(FetchError::Shape(_))));
    }

    #[test]
    fn test_fetch_non_array_is_shape_error() {
        let fetcher = fetcher_with_body(r#"{"aircraft": "lots"}"#);
        assert!(matches!(fetcher.fetch(), Err(FetchError::Shape(_))));
    }

    #[test]
    fn test_fetch_invalid_json_is_parse_error() {
        let fetcher = fetcher_with_body("<html>502 Bad Gateway</html>");
        assert!(matches!(fetcher.fetch(), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_fetch_skips_malformed_entries() {
        let fetcher = fetcher_with_body(r#"{"aircraft":[{"hex":"abc123"}, 42, {"hex":"def456"}]}"#);
        let records = fetcher.fetch().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_fetch_propagates_transport_errors() {
        let fetcher = AircraftFetcher::with_client(
            point_config(),
            Arc::new(MockHttpClient {
                response: Err(FetchError::Status(503)),
            }),
        );
        assert!(matches!(fetcher.fetch(), Err(FetchError::Status(503))));
    }
}
