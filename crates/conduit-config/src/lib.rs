//! Typed configuration for the Conduit request mediator.
//!
//! This crate provides the configuration consumed by the `conduit` bootstrap:
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`ConduitConfig`] has two sections:
//!
//! - [`DispatchConfig`] - registry freezing, composition timing, built-in
//!   timeout and retry pipes
//! - [`TelemetryConfigSection`] - service identity, metrics and logging
//!
//! # Example
//!
//! ```no_run
//! use conduit_config::ConfigLoader;
//!
//! # fn main() -> Result<(), conduit_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("conduit.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("CONDUIT")
//!     .load()?;
//!
//! println!("strict handlers: {}", config.dispatch.strict_handlers);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [dispatch]
//! eager_composition = true
//! strict_handlers = true
//! default_timeout_ms = 5000
//!
//! [dispatch.retry]
//! enabled = true
//! max_attempts = 3
//! backoff_ms = 50
//!
//! [telemetry]
//! service_name = "orders"
//! environment = "production"
//!
//! [telemetry.metrics]
//! enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `CONDUIT__DISPATCH__DEFAULT_TIMEOUT_MS=250`
//! - `CONDUIT__DISPATCH__RETRY__ENABLED=true`
//! - `CONDUIT__TELEMETRY__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConduitConfig::default();
        assert!(config.dispatch.default_timeout_ms.is_none());
        assert_eq!(config.dispatch.retry.max_attempts, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = ConduitConfig::builder()
            .dispatch(DispatchConfig {
                default_timeout_ms: Some(100),
                ..Default::default()
            })
            .build();

        assert_eq!(config.dispatch.default_timeout_ms, Some(100));
    }
}
