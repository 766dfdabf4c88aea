//! Installs the Prometheus recorder once and checks the rendered output.
//!
//! Kept in its own test binary because the recorder is process-global.

use conduit_telemetry::metrics::{self, init_metrics, names, MetricsConfig};
use std::time::Duration;

#[test]
fn recorded_samples_show_up_in_render() {
    let config = MetricsConfig {
        service_name: "render-test".to_string(),
        ..MetricsConfig::default()
    };

    let registry = init_metrics(&config)
        .expect("recorder installs")
        .expect("metrics enabled");

    metrics::record_request("Ping", "success", Duration::from_millis(2));
    metrics::record_request("Ping", "failure", Duration::from_millis(4));
    metrics::record_retry("Ping");
    {
        let _guard = metrics::InFlightGuard::new();
    }

    let output = registry.render();
    assert!(output.contains(names::REQUESTS_TOTAL));
    assert!(output.contains(r#"request="Ping""#));
    assert!(output.contains(r#"outcome="failure""#));
    assert!(output.contains(names::RETRIES_TOTAL));
    assert!(output.contains(r#"service="render-test""#));

    // A second init hands back the installed recorder instead of failing.
    let again = init_metrics(&config).unwrap().unwrap();
    assert!(again.render().contains(names::REQUEST_DURATION_SECONDS));
    assert!(metrics::render_metrics().is_some());
}
