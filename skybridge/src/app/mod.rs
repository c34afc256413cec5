//! Application-level configuration and errors.
//!
//! This module defines the immutable [`BridgeConfig`] injected into every
//! component at construction time, the [`BridgeOptions`] add-on options file
//! it is validated from, and the [`AppError`] boundary error type.

mod config;
mod error;
mod options;

pub use config::{BridgeConfig, DEFAULT_POLL_INTERVAL_SECS};
pub use error::AppError;
pub use options::{BridgeOptions, NumberOrString};
