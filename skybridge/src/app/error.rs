//! Application error types.

use std::fmt;

use crate::fetch::FetchError;
use crate::mqtt::MqttError;

/// Errors that can occur during application lifecycle.
#[derive(Debug)]
pub enum AppError {
    /// Configuration failed validation.
    Config(String),

    /// Failed to construct the upstream HTTP client.
    HttpClient(FetchError),

    /// Fatal broker error (only produced when configured as fatal).
    Broker(MqttError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            AppError::HttpClient(e) => {
                write!(f, "Failed to create HTTP client: {}", e)
            }
            AppError::Broker(e) => {
                write!(f, "Broker error: {}", e)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(_) => None,
            AppError::HttpClient(e) => Some(e),
            AppError::Broker(e) => Some(e),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::HttpClient(e)
    }
}

impl From<MqttError> for AppError {
    fn from(e: MqttError) -> Self {
        AppError::Broker(e)
    }
}
