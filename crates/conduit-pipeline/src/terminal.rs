//! Innermost pipeline stages.
//!
//! Every pipeline ends in exactly one terminal stage: a [`HandlerPipe`] when
//! a handler is registered for the request type, otherwise a
//! [`TerminationPipe`]. Terminal stages never call `next`.

use std::future::ready;
use std::marker::PhantomData;

use conduit_core::{
    CancellationToken, DispatchError, Error, Handler, PipeResult, Request, RequestContext,
    Response,
};

use crate::pipe::{BoxFuture, Next, Pipe};

/// Adapts a [`Handler`] into the innermost pipe.
pub struct HandlerPipe<R, H> {
    handler: H,
    _request: PhantomData<fn() -> R>,
}

impl<R: Request, H: Handler<R>> HandlerPipe<R, H> {
    /// Wraps a handler.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _request: PhantomData,
        }
    }

    /// Returns the wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<R: Request, H: Handler<R>> Pipe<R> for HandlerPipe<R, H> {
    fn name(&self) -> &'static str {
        "handler"
    }

    fn process<'a>(
        &'a self,
        _next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(DispatchError::Canceled);
            }
            self.handler.handle(ctx, cancel).await
        })
    }
}

/// Terminal stage for request types without a handler.
///
/// Always answers `Failure(Error::internal_server_error())`, so dispatching
/// an unhandled type is deterministic and never panics.
pub struct TerminationPipe<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R> TerminationPipe<R> {
    /// Creates the fallback stage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for TerminationPipe<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Request> Pipe<R> for TerminationPipe<R> {
    fn name(&self) -> &'static str {
        "termination"
    }

    fn process<'a>(
        &'a self,
        _next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>> {
        tracing::debug!(
            request_type = ctx.request_type(),
            request_id = %ctx.request_id(),
            "No handler registered, returning internal error"
        );
        Box::pin(ready(Ok(Response::failure(Error::internal_server_error()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{continuation, Continuation};
    use conduit_core::{ErrorCategory, FnHandler};

    struct Ping(String);

    impl Request for Ping {
        type Response = String;
    }

    fn unreachable_inner() -> Continuation<Ping> {
        continuation(|_ctx: &RequestContext<Ping>, _cancel| {
            Box::pin(ready(Err(DispatchError::fault(anyhow::anyhow!(
                "terminal stage ran next"
            )))))
        })
    }

    #[tokio::test]
    async fn test_handler_pipe_invokes_handler() {
        let pipe = HandlerPipe::new(FnHandler::new(|ctx: &RequestContext<Ping>| {
            Response::success(format!("Pong: {}", ctx.request().0))
        }));
        let inner = unreachable_inner();
        let ctx = RequestContext::new(Ping("hi".into()));
        let cancel = CancellationToken::new();

        let next = Next::new(Some(&inner), &ctx, &cancel);
        let response = pipe.process(next, &ctx, &cancel).await.unwrap();
        assert_eq!(response.into_value().unwrap(), "Pong: hi");
        assert_eq!(pipe.name(), "handler");
    }

    #[tokio::test]
    async fn test_handler_pipe_checks_cancellation() {
        let pipe = HandlerPipe::new(FnHandler::new(|_ctx: &RequestContext<Ping>| {
            panic!("handler must not run after cancellation")
        }));
        let ctx = RequestContext::new(Ping("hi".into()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let next = Next::new(None, &ctx, &cancel);
        let result = pipe.process(next, &ctx, &cancel).await;
        assert!(matches!(result, Err(DispatchError::Canceled)));
    }

    #[test]
    fn test_termination_pipe_returns_internal_error() {
        let pipe = TerminationPipe::<Ping>::new();
        let ctx = RequestContext::new(Ping("lost".into()));
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let next = Next::new(None, &ctx, &cancel);
            let response = tokio_test::block_on(pipe.process(next, &ctx, &cancel)).unwrap();
            let error = response.into_error().unwrap();
            assert_eq!(error.category(), ErrorCategory::Internal);
            assert_eq!(error.code(), "generic.internal_server_error");
        }
    }
}
