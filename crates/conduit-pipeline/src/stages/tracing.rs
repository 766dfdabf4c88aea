//! Tracing pipe.
//!
//! Opens a `conduit.dispatch` span around the inner chain and records the
//! outcome and duration on it. Events emitted by inner pipes and the handler
//! are nested under this span.
//!
//! ## Span Fields
//!
//! - `request_type` - Short request type name
//! - `request_id` - The context's request ID
//! - `outcome` - Outcome label (recorded on completion)
//! - `duration_ms` - Time spent inside the span (recorded on completion)

use std::time::Instant;

use conduit_core::{CancellationToken, Context, DispatchError, PipeResult, Response};
use tracing::{field, Instrument};

use super::{duration_ms, outcome_label};
use crate::pipe::{AnyNext, AnyValue, BoxFuture, GenericPipe};

/// Generic pipe that wraps every dispatch in a span.
///
/// Register it first so its span encloses all other pipes.
///
/// # Example
///
/// ```ignore
/// use conduit_pipeline::stages::TracingPipe;
///
/// builder.generic_pipe(|| TracingPipe::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPipe {
    _private: (),
}

impl TracingPipe {
    /// Creates a new tracing pipe.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl GenericPipe for TracingPipe {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>> {
        let span = tracing::info_span!(
            "conduit.dispatch",
            request_type = ctx.request_type(),
            request_id = %ctx.request_id(),
            outcome = field::Empty,
            duration_ms = field::Empty,
        );

        Box::pin(async move {
            let started = Instant::now();
            let result = next.run().instrument(span.clone()).await;
            let elapsed = duration_ms(started.elapsed());

            span.record("outcome", outcome_label(&result));
            span.record("duration_ms", elapsed);

            match &result {
                Ok(Response::Success(_)) => {
                    tracing::debug!(parent: &span, duration_ms = elapsed, "Request completed");
                }
                Ok(Response::Failure(error)) => {
                    tracing::info!(
                        parent: &span,
                        error.code = error.code(),
                        error.category = %error.category(),
                        duration_ms = elapsed,
                        "Request failed"
                    );
                }
                Err(DispatchError::Canceled) => {
                    tracing::debug!(parent: &span, duration_ms = elapsed, "Request canceled");
                }
                Err(error) => {
                    tracing::warn!(
                        parent: &span,
                        error = %error,
                        duration_ms = elapsed,
                        "Request faulted"
                    );
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;
    use conduit_core::{Error, FnHandler, Request, RequestContext};

    struct Lookup(u32);

    impl Request for Lookup {
        type Response = String;
    }

    #[tokio::test]
    async fn test_tracing_pipe_is_transparent() {
        let pipeline = Pipeline::<Lookup>::builder()
            .generic(TracingPipe::new())
            .handler(FnHandler::new(|ctx: &RequestContext<Lookup>| {
                if ctx.request().0 == 0 {
                    Response::failure(Error::not_found("no such record"))
                } else {
                    Response::success(format!("record {}", ctx.request().0))
                }
            }))
            .build();
        let cancel = CancellationToken::new();

        let found = pipeline
            .invoke(&RequestContext::new(Lookup(7)), &cancel)
            .await
            .unwrap();
        assert_eq!(found.into_value().unwrap(), "record 7");

        let missing = pipeline
            .invoke(&RequestContext::new(Lookup(0)), &cancel)
            .await
            .unwrap();
        assert!(missing.is_failure());
        assert_eq!(pipeline.stage_names()[0], "tracing");
    }
}
