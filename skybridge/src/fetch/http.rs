//! HTTP client abstraction for testability

use std::time::Duration;

use super::types::FetchError;

/// Header carrying the API key in authenticated (circle) mode.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `api_key` - Optional API key sent as the `X-API-Key` header
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str, api_key: Option<&str>) -> Result<Vec<u8>, FetchError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, api_key: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network(format!("Failed to read response: {}", e)))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Mock HTTP client for testing
    pub struct MockHttpClient {
        pub response: Result<Vec<u8>, FetchError>,
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, _url: &str, _api_key: Option<&str>) -> Result<Vec<u8>, FetchError> {
            self.response.clone()
        }
    }

    #[test]
    fn test_mock_client_success() {
        let mock = MockHttpClient {
            response: Ok(b"{}".to_vec()),
        };

        let result = mock.get("http://example.com", None);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_mock_client_error() {
        let mock = MockHttpClient {
            response: Err(FetchError::Timeout),
        };

        let result = mock.get("http://example.com", None);
        assert!(matches!(result, Err(FetchError::Timeout)));
    }
}
