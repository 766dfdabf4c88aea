//! Prometheus metrics for Conduit.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `conduit_requests_total` | Counter | `request`, `outcome` | Dispatched requests |
//! | `conduit_request_duration_seconds` | Histogram | `request` | Pipeline latency |
//! | `conduit_in_flight_requests` | Gauge | - | Requests inside a pipeline |
//! | `conduit_retries_total` | Counter | `request` | Re-invocations by the retry pipe |
//! | `conduit_compositions_total` | Counter | `request` | Pipelines composed |
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! dispatcher can call them unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_telemetry::metrics::{init_metrics, record_request, MetricsConfig};
//! use std::time::Duration;
//!
//! let registry = init_metrics(&MetricsConfig::default())?.expect("enabled");
//! record_request("Ping", "success", Duration::from_millis(3));
//! println!("{}", registry.render());
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle, set by the first successful [`init_metrics`].
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Counter of dispatched requests.
    pub const REQUESTS_TOTAL: &str = "conduit_requests_total";
    /// Histogram of pipeline latency in seconds.
    pub const REQUEST_DURATION_SECONDS: &str = "conduit_request_duration_seconds";
    /// Gauge of requests currently inside a pipeline.
    pub const IN_FLIGHT_REQUESTS: &str = "conduit_in_flight_requests";
    /// Counter of retry re-invocations.
    pub const RETRIES_TOTAL: &str = "conduit_retries_total";
    /// Counter of composed pipelines.
    pub const COMPOSITIONS_TOTAL: &str = "conduit_compositions_total";
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Service name for metric labels.
    pub service_name: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "conduit".to_string(),
            // In-process dispatch is fast: 50us .. 5s.
            duration_buckets: vec![
                0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
            ],
        }
    }
}

/// Handle to the installed Prometheus recorder.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with the given handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initializes the metrics subsystem.
///
/// Installs a global Prometheus recorder without an HTTP listener; the host
/// exposes [`MetricsRegistry::render`] however it likes. Returns `None` when
/// metrics are disabled. Calling this again after a successful install returns
/// the existing registry.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for unusable buckets and
/// `TelemetryError::MetricsInit` if another recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(Some(MetricsRegistry::new(handle.clone())));
    }

    if config.duration_buckets.is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "duration_buckets must not be empty".to_string(),
        ));
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", config.service_name.clone())
        .set_buckets_for_metric(
            Matcher::Full(names::REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();

    describe_metrics();

    Ok(Some(MetricsRegistry::new(handle)))
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for all standard metrics.
pub fn describe_metrics() {
    describe_counter!(names::REQUESTS_TOTAL, "Total number of dispatched requests");
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time spent inside a request pipeline"
    );
    describe_gauge!(
        names::IN_FLIGHT_REQUESTS,
        "Number of requests currently inside a pipeline"
    );
    describe_counter!(
        names::RETRIES_TOTAL,
        "Total number of pipeline re-invocations by the retry pipe"
    );
    describe_counter!(
        names::COMPOSITIONS_TOTAL,
        "Total number of request pipelines composed"
    );
}

/// Records a completed dispatch.
///
/// `outcome` is one of the labels in `logging::fields::OUTCOME`.
pub fn record_request(request_type: &'static str, outcome: &'static str, duration: Duration) {
    counter!(
        names::REQUESTS_TOTAL,
        "request" => request_type,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(names::REQUEST_DURATION_SECONDS, "request" => request_type)
        .record(duration.as_secs_f64());
}

/// Records one retry re-invocation.
pub fn record_retry(request_type: &'static str) {
    counter!(names::RETRIES_TOTAL, "request" => request_type).increment(1);
}

/// Records a pipeline composition.
pub fn record_composition(request_type: &'static str) {
    counter!(names::COMPOSITIONS_TOTAL, "request" => request_type).increment(1);
}

/// Guard that keeps the in-flight gauge incremented while alive.
///
/// Dropping the guard decrements the gauge, including when the owning future
/// is dropped mid-flight.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(names::IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(names::IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
