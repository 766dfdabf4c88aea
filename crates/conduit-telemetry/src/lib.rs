//! Observability for the Conduit request mediator.
//!
//! - **Logging**: structured JSON or pretty logs via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! The dispatcher and the built-in pipes only emit `tracing` events and
//! `metrics` samples; nothing is exported until the host installs a
//! subscriber and a recorder with [`init_telemetry`] (or the individual
//! `init_*` functions).
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `conduit_requests_total` | Counter | `request`, `outcome` | Dispatched requests |
//! | `conduit_request_duration_seconds` | Histogram | `request` | Pipeline latency |
//! | `conduit_in_flight_requests` | Gauge | - | Requests inside a pipeline |
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! let logging = LogConfig {
//!     service_name: "orders".to_string(),
//!     ..LogConfig::production()
//! };
//! let metrics = MetricsConfig {
//!     service_name: "orders".to_string(),
//!     ..MetricsConfig::default()
//! };
//!
//! let telemetry = init_telemetry(&logging, &metrics)?;
//! if let Some(metrics) = telemetry.metrics() {
//!     println!("{}", metrics.render());
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, InFlightGuard, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Handles produced by [`init_telemetry`].
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    metrics: Option<MetricsRegistry>,
}

impl Telemetry {
    /// Returns the metrics registry, if metrics are enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(
    logging: &LogConfig,
    metrics: &MetricsConfig,
) -> TelemetryResult<Telemetry> {
    init_logging(logging)?;
    let registry = init_metrics(metrics)?;

    tracing::info!(
        service.name = %logging.service_name,
        metrics = registry.is_some(),
        "Telemetry initialized"
    );

    Ok(Telemetry { metrics: registry })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_telemetry_with_everything_disabled() {
        let logging = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        let metrics = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };

        let telemetry = init_telemetry(&logging, &metrics).unwrap();
        assert!(telemetry.metrics().is_none());
    }
}
