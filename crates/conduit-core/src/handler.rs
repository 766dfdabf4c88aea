//! Handler trait for request processing.
//!
//! The [`Handler`] trait defines the terminal logic for one request type.

use crate::{CancellationToken, PipeResult, Request, RequestContext, Response};
use std::future::Future;
use std::sync::Arc;

/// Terminal logic for a request type.
///
/// At most one handler is registered per request type. A handler returns a
/// domain outcome inside `Ok`; an `Err` is reserved for cancellation and
/// unexpected faults.
///
/// # Example
///
/// ```rust
/// use conduit_core::{CancellationToken, Handler, PipeResult, Request, RequestContext, Response};
///
/// struct Ping {
///     message: String,
/// }
///
/// impl Request for Ping {
///     type Response = String;
/// }
///
/// struct PingHandler;
///
/// impl Handler<Ping> for PingHandler {
///     async fn handle(
///         &self,
///         ctx: &RequestContext<Ping>,
///         _cancel: &CancellationToken,
///     ) -> PipeResult<String> {
///         Ok(Response::success(format!("Pong: {}", ctx.request().message)))
///     }
/// }
/// ```
pub trait Handler<R: Request>: Send + Sync + 'static {
    /// Handles a request.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`](crate::DispatchError) if the handler was
    /// canceled or hit an unexpected fault. Business failures belong in
    /// `Ok(Response::Failure(..))`.
    fn handle(
        &self,
        ctx: &RequestContext<R>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = PipeResult<R::Response>> + Send;
}

impl<R: Request, H: Handler<R>> Handler<R> for Arc<H> {
    fn handle(
        &self,
        ctx: &RequestContext<R>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = PipeResult<R::Response>> + Send {
        (**self).handle(ctx, cancel)
    }
}

/// A handler built from a synchronous closure.
///
/// # Example
///
/// ```rust
/// use conduit_core::{FnHandler, Request, RequestContext, Response};
///
/// struct Add(i32, i32);
///
/// impl Request for Add {
///     type Response = i32;
/// }
///
/// let handler = FnHandler::new(|ctx: &RequestContext<Add>| {
///     let Add(a, b) = ctx.request();
///     Response::success(a + b)
/// });
/// ```
pub struct FnHandler<R, F> {
    func: F,
    _request: std::marker::PhantomData<fn() -> R>,
}

impl<R, F> FnHandler<R, F>
where
    R: Request,
    F: Fn(&RequestContext<R>) -> Response<R::Response> + Send + Sync + 'static,
{
    /// Creates a new function-based handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _request: std::marker::PhantomData,
        }
    }
}

impl<R, F> Handler<R> for FnHandler<R, F>
where
    R: Request,
    F: Fn(&RequestContext<R>) -> Response<R::Response> + Send + Sync + 'static,
{
    fn handle(
        &self,
        ctx: &RequestContext<R>,
        _cancel: &CancellationToken,
    ) -> impl Future<Output = PipeResult<R::Response>> + Send {
        std::future::ready(Ok((self.func)(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DispatchError, Error};

    struct Greet {
        name: String,
    }

    impl Request for Greet {
        type Response = String;
    }

    struct GreetHandler;

    impl Handler<Greet> for GreetHandler {
        async fn handle(
            &self,
            ctx: &RequestContext<Greet>,
            _cancel: &CancellationToken,
        ) -> PipeResult<String> {
            Ok(Response::success(format!("Hello, {}!", ctx.request().name)))
        }
    }

    struct CancelAware;

    impl Handler<Greet> for CancelAware {
        async fn handle(
            &self,
            _ctx: &RequestContext<Greet>,
            cancel: &CancellationToken,
        ) -> PipeResult<String> {
            if cancel.is_cancelled() {
                return Err(DispatchError::Canceled);
            }
            Ok(Response::failure(Error::not_found("nobody home")))
        }
    }

    fn greet(name: &str) -> RequestContext<Greet> {
        RequestContext::new(Greet {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn test_handler_impl() {
        let response = GreetHandler
            .handle(&greet("World"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.into_value().as_deref(), Some("Hello, World!"));
    }

    #[tokio::test]
    async fn test_handler_failure_is_a_value() {
        let response = CancelAware
            .handle(&greet("x"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.is_failure());
    }

    #[tokio::test]
    async fn test_handler_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = CancelAware.handle(&greet("x"), &cancel).await;
        assert!(matches!(result, Err(DispatchError::Canceled)));
    }

    #[tokio::test]
    async fn test_arc_handler_delegates() {
        let handler = Arc::new(GreetHandler);
        let response = handler
            .handle(&greet("Arc"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.value().map(String::as_str), Some("Hello, Arc!"));
    }

    #[test]
    fn test_fn_handler() {
        let handler = FnHandler::new(|ctx: &RequestContext<Greet>| {
            Response::success(ctx.request().name.to_uppercase())
        });
        let response =
            tokio_test::block_on(handler.handle(&greet("shout"), &CancellationToken::new()))
                .unwrap();
        assert_eq!(response.into_value().as_deref(), Some("SHOUT"));
    }
}
