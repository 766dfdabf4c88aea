//! Main configuration types.
//!
//! This module provides the top-level [`ConduitConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DispatchConfig, LogFormat, TelemetryConfigSection};

/// Upper bound for the retry backoff, in milliseconds.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Complete Conduit configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use conduit_config::ConduitConfig;
///
/// let config = ConduitConfig::default();
/// assert!(!config.dispatch.strict_handlers);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConduitConfig {
    /// Dispatch configuration.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Telemetry configuration (metrics, logging).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl ConduitConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_config::{ConduitConfig, DispatchConfig};
    ///
    /// let config = ConduitConfig::builder()
    ///     .dispatch(DispatchConfig {
    ///         strict_handlers: true,
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert!(config.dispatch.strict_handlers);
    /// ```
    #[must_use]
    pub fn builder() -> ConduitConfigBuilder {
        ConduitConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `dispatch.default_timeout_ms` is zero
    /// - `dispatch.retry.max_attempts` is zero
    /// - `dispatch.retry.backoff_ms` exceeds one minute
    /// - `telemetry.logging.level` is empty
    /// - `telemetry.metrics.histogram_buckets` is empty or not strictly ascending
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.default_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "dispatch.default_timeout_ms",
                "must be greater than zero",
            ));
        }

        let retry = &self.dispatch.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "dispatch.retry.max_attempts",
                "must be at least 1",
            ));
        }
        if retry.backoff_ms > MAX_BACKOFF_MS {
            return Err(ConfigError::invalid_value(
                "dispatch.retry.backoff_ms",
                format!("must not exceed {MAX_BACKOFF_MS}"),
            ));
        }

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        let buckets = &self.telemetry.metrics.histogram_buckets;
        if self.telemetry.metrics.enabled {
            if buckets.is_empty() {
                return Err(ConfigError::validation_error(
                    "telemetry.metrics.histogram_buckets must not be empty",
                ));
            }
            if !buckets.windows(2).all(|pair| pair[0] < pair[1]) {
                return Err(ConfigError::validation_error(
                    "telemetry.metrics.histogram_buckets must be strictly ascending",
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Pretty, debug-level logs with source locations
    /// - Lazy composition, missing handlers only warn
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_config::ConduitConfig;
    ///
    /// let config = ConduitConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();

        config.dispatch.eager_composition = false;
        config.dispatch.strict_handlers = false;

        config
    }

    /// Create a production configuration preset.
    ///
    /// - JSON, info-level logs
    /// - Eager composition, missing handlers refuse to freeze
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_config::{ConduitConfig, LogFormat};
    ///
    /// let config = ConduitConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// assert!(config.dispatch.strict_handlers);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.environment = "production".to_string();

        config.dispatch.eager_composition = true;
        config.dispatch.strict_handlers = true;

        config
    }
}

/// Builder for [`ConduitConfig`].
#[derive(Debug, Default)]
pub struct ConduitConfigBuilder {
    dispatch: Option<DispatchConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl ConduitConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch configuration.
    #[must_use]
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> ConduitConfig {
        ConduitConfig {
            dispatch: self.dispatch.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ConduitConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
