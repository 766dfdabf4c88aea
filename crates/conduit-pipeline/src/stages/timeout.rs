//! Timeout pipe.

use std::time::Duration;

use conduit_core::{CancellationToken, Context, Error, PipeResult, Response};

use super::duration_ms;
use crate::pipe::{AnyNext, AnyValue, BoxFuture, GenericPipe};

/// Generic pipe that bounds the run time of the inner chain.
///
/// When the limit elapses the inner future is dropped and the pipe answers
/// `Failure(Error::timeout(..))` with a `timeout_ms` detail. The inner chain
/// is not signalled beyond being dropped.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPipe {
    timeout: Duration,
}

impl TimeoutPipe {
    /// Creates a timeout pipe.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured limit.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl GenericPipe for TimeoutPipe {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, next.run()).await {
                Ok(result) => result,
                Err(_) => {
                    let limit = duration_ms(self.timeout);
                    tracing::warn!(
                        request_type = ctx.request_type(),
                        request_id = %ctx.request_id(),
                        timeout_ms = limit,
                        "Request timed out"
                    );
                    let error = Error::timeout(format!(
                        "{} did not complete within {limit}ms",
                        ctx.request_type()
                    ))
                    .with_detail("timeout_ms", limit);
                    Ok(Response::failure(error))
                }
            }
        })
    }
}
