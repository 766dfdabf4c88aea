//! Retry pipe.
//!
//! Re-runs the inner chain while it answers with a transient failure
//! (`ErrorCategory::is_transient`), up to a fixed number of attempts with a
//! fixed delay in between. Faults, cancellation and non-transient failures
//! are returned immediately.

use std::time::Duration;

use conduit_core::{CancellationToken, Context, DispatchError, PipeResult, Response};
use conduit_telemetry::metrics::record_retry;

use crate::pipe::{AnyNext, AnyValue, BoxFuture, GenericPipe};

/// Generic pipe that retries transient failures.
///
/// # Example
///
/// ```
/// use conduit_pipeline::stages::RetryPipe;
/// use std::time::Duration;
///
/// let retry = RetryPipe::new(3, Duration::from_millis(50));
/// assert_eq!(retry.max_attempts(), 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPipe {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPipe {
    /// Creates a retry pipe. `max_attempts` counts the first attempt and is
    /// raised to 1 if zero.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Total attempts including the first one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPipe {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

impl GenericPipe for RetryPipe {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>> {
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                let result = next.run().await;

                let transient = match &result {
                    Ok(Response::Failure(error)) if error.category().is_transient() => error,
                    _ => return result,
                };
                if attempt >= self.max_attempts {
                    tracing::debug!(
                        request_type = ctx.request_type(),
                        attempt,
                        error.code = transient.code(),
                        "Retry attempts exhausted"
                    );
                    return result;
                }

                tracing::debug!(
                    request_type = ctx.request_type(),
                    attempt,
                    error.code = transient.code(),
                    "Retrying transient failure"
                );
                record_retry(ctx.request_type());
                attempt += 1;

                if !self.backoff.is_zero() {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(DispatchError::Canceled),
                        () = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        let retry = RetryPipe::new(0, Duration::ZERO);
        assert_eq!(retry.max_attempts(), 1);
    }

    #[test]
    fn test_default() {
        let retry = RetryPipe::default();
        assert_eq!(retry.max_attempts(), 3);
        assert_eq!(retry.backoff(), Duration::from_millis(50));
        assert_eq!(retry.name(), "retry");
    }
}
