//! Built-in pipes.
//!
//! None of these are installed implicitly; register them like any other pipe
//! (the `conduit` bootstrap installs [`TimeoutPipe`] and [`RetryPipe`] from
//! configuration).
//!
//! | Pipe | Kind | Purpose |
//! |------|------|---------|
//! | [`TracingPipe`] | generic | Span and outcome log per dispatch |
//! | [`MetricsPipe`] | generic | Request counter, latency histogram, in-flight gauge |
//! | [`RetryPipe`] | generic | Re-run the inner chain on transient failures |
//! | [`TimeoutPipe`] | generic | Bound the inner chain's run time |
//! | [`ValidationPipe`] | specific | Short-circuit invalid requests |

pub mod metrics;
pub mod retry;
pub mod timeout;
pub mod tracing;
pub mod validation;

pub use self::metrics::MetricsPipe;
pub use retry::RetryPipe;
pub use timeout::TimeoutPipe;
pub use self::tracing::TracingPipe;
pub use validation::{Validate, ValidationPipe};

use conduit_core::{DispatchError, PipeResult, Response};

/// Label for a pipeline outcome, as used in logs and metrics.
///
/// One of `success`, `failure`, `canceled`, `misconfigured` or `fault`.
#[must_use]
pub fn outcome_label<T>(result: &PipeResult<T>) -> &'static str {
    match result {
        Ok(Response::Success(_)) => "success",
        Ok(Response::Failure(_)) => "failure",
        Err(DispatchError::Canceled) => "canceled",
        Err(DispatchError::Configuration(_)) => "misconfigured",
        Err(DispatchError::Fault(_)) => "fault",
    }
}

pub(crate) fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{ConfigurationError, Error};

    #[test]
    fn test_outcome_labels() {
        let ok: PipeResult<u8> = Ok(Response::success(1));
        let failed: PipeResult<u8> = Ok(Response::failure(Error::conflict("stale")));
        let canceled: PipeResult<u8> = Err(DispatchError::Canceled);
        let misconfigured: PipeResult<u8> =
            Err(ConfigurationError::NotRegistered { request: "Ping" }.into());
        let fault: PipeResult<u8> = Err(DispatchError::fault(anyhow::anyhow!("boom")));

        assert_eq!(outcome_label(&ok), "success");
        assert_eq!(outcome_label(&failed), "failure");
        assert_eq!(outcome_label(&canceled), "canceled");
        assert_eq!(outcome_label(&misconfigured), "misconfigured");
        assert_eq!(outcome_label(&fault), "fault");
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(std::time::Duration::from_micros(2_500)), 2);
    }
}
