//! Metrics pipe.
//!
//! Records, for every dispatch passing through it:
//!
//! - `conduit_requests_total{request, outcome}`
//! - `conduit_request_duration_seconds{request}`
//! - `conduit_in_flight_requests`
//!
//! Recording is a no-op until a recorder is installed with
//! `conduit_telemetry::init_metrics`.

use std::time::Instant;

use conduit_core::{CancellationToken, Context, PipeResult};
use conduit_telemetry::metrics::{record_request, InFlightGuard};

use super::outcome_label;
use crate::pipe::{AnyNext, AnyValue, BoxFuture, GenericPipe};

/// Generic pipe that records request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsPipe {
    _private: (),
}

impl MetricsPipe {
    /// Creates a new metrics pipe.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl GenericPipe for MetricsPipe {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>> {
        Box::pin(async move {
            let _in_flight = InFlightGuard::new();
            let started = Instant::now();

            let result = next.run().await;

            record_request(ctx.request_type(), outcome_label(&result), started.elapsed());
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;
    use conduit_core::{FnHandler, Request, RequestContext, Response};

    struct Tick;

    impl Request for Tick {
        type Response = u64;
    }

    #[tokio::test]
    async fn test_metrics_pipe_without_recorder() {
        let pipeline = Pipeline::<Tick>::builder()
            .generic(MetricsPipe::new())
            .handler(FnHandler::new(|_ctx: &RequestContext<Tick>| {
                Response::success(1)
            }))
            .build();

        let response = pipeline
            .invoke(&RequestContext::new(Tick), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.into_value(), Some(1));
    }
}
