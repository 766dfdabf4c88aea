//! The pipe primitive.
//!
//! A [`Pipe`] wraps the rest of a request pipeline. It receives a [`Next`]
//! continuation for everything inside it and may run code before and after
//! calling it, replace its outcome, call it several times, or not call it at
//! all (short-circuit).
//!
//! # Example
//!
//! ```
//! use conduit_core::{CancellationToken, PipeResult, Request, RequestContext};
//! use conduit_pipeline::{BoxFuture, Next, Pipe};
//!
//! struct Ping;
//!
//! impl Request for Ping {
//!     type Response = String;
//! }
//!
//! struct LoggingPipe;
//!
//! impl Pipe<Ping> for LoggingPipe {
//!     fn name(&self) -> &'static str {
//!         "logging"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         next: Next<'a, Ping>,
//!         ctx: &'a RequestContext<Ping>,
//!         _cancel: &'a CancellationToken,
//!     ) -> BoxFuture<'a, PipeResult<String>> {
//!         Box::pin(async move {
//!             println!("before {}", ctx.request_id());
//!             let result = next.run().await;
//!             println!("after {}", ctx.request_id());
//!             result
//!         })
//!     }
//! }
//! ```

use std::any::Any;
use std::future::{ready, Future};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use conduit_core::{
    short_type_name, CancellationToken, Context, DispatchError, PipeResult, Request,
    RequestContext, Response,
};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased success value flowing through a [`GenericPipe`].
pub type AnyValue = Box<dyn Any + Send>;

/// Middleware node for requests of type `R`.
///
/// # Invariants
///
/// - `next` may be run zero, one or several times
/// - `ctx` and `cancel` are the same for every layer of one dispatch
/// - Faults returned by `next` SHOULD be propagated, not converted into
///   failures
pub trait Pipe<R: Request>: Send + Sync + 'static {
    /// Name of this pipe for logs and [`Pipeline::stage_names`](crate::Pipeline::stage_names).
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Processes the request, optionally delegating to `next`.
    fn process<'a>(
        &'a self,
        next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>>;
}

impl<R: Request, P: Pipe<R> + ?Sized> Pipe<R> for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process<'a>(
        &'a self,
        next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>> {
        (**self).process(next, ctx, cancel)
    }
}

/// A composed continuation: everything inside one pipe.
pub(crate) type Continuation<R> = Arc<
    dyn for<'a> Fn(
            &'a RequestContext<R>,
            &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<<R as Request>::Response>>
        + Send
        + Sync,
>;

/// Pins a closure to the higher-ranked continuation signature.
pub(crate) fn continuation<R, F>(f: F) -> Continuation<R>
where
    R: Request,
    F: for<'a> Fn(
            &'a RequestContext<R>,
            &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<R::Response>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Wraps `pipe` around `inner`. `None` marks the innermost (terminal) layer.
pub(crate) fn wrap<R: Request>(
    pipe: Arc<dyn Pipe<R>>,
    inner: Option<Continuation<R>>,
) -> Continuation<R> {
    continuation(move |ctx, cancel| {
        let pipe = Arc::clone(&pipe);
        let inner = inner.clone();
        Box::pin(async move {
            let next = Next::new(inner.as_ref(), ctx, cancel);
            pipe.process(next, ctx, cancel).await
        })
    })
}

/// Continuation into the rest of the pipeline.
///
/// `Next` is `Copy`: a pipe that needs to re-run the inner chain (retries)
/// simply calls [`run`](Self::run) again.
pub struct Next<'a, R: Request> {
    inner: Option<&'a Continuation<R>>,
    ctx: &'a RequestContext<R>,
    cancel: &'a CancellationToken,
}

impl<R: Request> Clone for Next<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Request> Copy for Next<'_, R> {}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(
        inner: Option<&'a Continuation<R>>,
        ctx: &'a RequestContext<R>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self { inner, ctx, cancel }
    }

    /// Runs the inner chain.
    ///
    /// Returns `Err(DispatchError::Canceled)` without entering the chain when
    /// the call's token has already been cancelled.
    pub fn run(self) -> BoxFuture<'a, PipeResult<R::Response>> {
        if self.cancel.is_cancelled() {
            return Box::pin(ready(Err(DispatchError::Canceled)));
        }

        match self.inner {
            Some(inner) => (**inner)(self.ctx, self.cancel),
            None => Box::pin(ready(Err(DispatchError::fault(anyhow::anyhow!(
                "terminal stage of {} called next",
                R::type_name()
            ))))),
        }
    }

    /// Returns `true` if running this continuation reaches another stage.
    #[must_use]
    pub fn has_inner(&self) -> bool {
        self.inner.is_some()
    }
}

/// Middleware that applies to every request type.
///
/// Generic pipes see the request through the object-safe [`Context`] view
/// and the outcome as a [`Response<AnyValue>`]. A generic pipe that produces
/// its own success value must box a value of the request's response type;
/// anything else is reported as a fault.
pub trait GenericPipe: Send + Sync + 'static {
    /// Name of this pipe for logs.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Processes a request of any type.
    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>>;
}

impl<P: GenericPipe + ?Sized> GenericPipe for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process<'a>(
        &'a self,
        next: AnyNext<'a>,
        ctx: &'a dyn Context,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<AnyValue>> {
        (**self).process(next, ctx, cancel)
    }
}

trait ErasedNext<'a>: Send + Sync {
    fn run_erased(&self) -> BoxFuture<'a, PipeResult<AnyValue>>;
}

impl<'a, R: Request> ErasedNext<'a> for Next<'a, R> {
    fn run_erased(&self) -> BoxFuture<'a, PipeResult<AnyValue>> {
        let next = *self;
        Box::pin(async move {
            let response = next.run().await?;
            Ok(response.map(|value| Box::new(value) as AnyValue))
        })
    }
}

/// Type-erased [`Next`] handed to a [`GenericPipe`].
pub struct AnyNext<'a> {
    inner: Box<dyn ErasedNext<'a> + 'a>,
}

impl<'a> AnyNext<'a> {
    fn new<R: Request>(next: Next<'a, R>) -> Self {
        Self {
            inner: Box::new(next),
        }
    }

    /// Runs the inner chain. May be called more than once.
    pub fn run(&self) -> BoxFuture<'a, PipeResult<AnyValue>> {
        self.inner.run_erased()
    }
}

/// Presents a [`GenericPipe`] as a [`Pipe<R>`].
pub struct GenericPipeAdapter<R> {
    inner: Arc<dyn GenericPipe>,
    _request: PhantomData<fn() -> R>,
}

impl<R> GenericPipeAdapter<R> {
    /// Adapts a shared generic pipe.
    #[must_use]
    pub fn new(inner: Arc<dyn GenericPipe>) -> Self {
        Self {
            inner,
            _request: PhantomData,
        }
    }
}

impl<R: Request> Pipe<R> for GenericPipeAdapter<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn process<'a>(
        &'a self,
        next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>> {
        Box::pin(async move {
            let response = self.inner.process(AnyNext::new(next), ctx, cancel).await?;
            match response {
                Response::Success(value) => match value.downcast::<R::Response>() {
                    Ok(value) => Ok(Response::Success(*value)),
                    Err(_) => Err(DispatchError::fault(anyhow::anyhow!(
                        "generic pipe {} returned a value that is not a {}",
                        self.inner.name(),
                        std::any::type_name::<R::Response>()
                    ))),
                },
                Response::Failure(error) => Ok(Response::Failure(error)),
            }
        })
    }
}

impl<R> std::fmt::Debug for GenericPipeAdapter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericPipeAdapter")
            .field("inner", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::Error;

    struct Echo(&'static str);

    impl Request for Echo {
        type Response = String;
    }

    fn base() -> Continuation<Echo> {
        continuation(|ctx: &RequestContext<Echo>, _cancel| {
            let reply = format!("echo: {}", ctx.request().0);
            Box::pin(ready(Ok(Response::success(reply))))
        })
    }

    struct Passthrough;

    impl GenericPipe for Passthrough {
        fn process<'a>(
            &'a self,
            next: AnyNext<'a>,
            _ctx: &'a dyn Context,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<AnyValue>> {
            next.run()
        }
    }

    struct WrongType;

    impl GenericPipe for WrongType {
        fn process<'a>(
            &'a self,
            _next: AnyNext<'a>,
            _ctx: &'a dyn Context,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<AnyValue>> {
            Box::pin(ready(Ok(Response::success(Box::new(42_u32) as AnyValue))))
        }
    }

    struct Reject;

    impl GenericPipe for Reject {
        fn process<'a>(
            &'a self,
            _next: AnyNext<'a>,
            ctx: &'a dyn Context,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<AnyValue>> {
            let error = Error::forbidden(format!("{} rejected", ctx.request_type()));
            Box::pin(ready(Ok(Response::failure(error))))
        }
    }

    #[tokio::test]
    async fn test_next_runs_inner() {
        let inner = base();
        let ctx = RequestContext::new(Echo("hi"));
        let cancel = CancellationToken::new();

        let result = Next::new(Some(&inner), &ctx, &cancel).run().await.unwrap();
        assert_eq!(result.into_value().unwrap(), "echo: hi");
    }

    #[tokio::test]
    async fn test_next_observes_cancellation() {
        let inner = base();
        let ctx = RequestContext::new(Echo("hi"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Next::new(Some(&inner), &ctx, &cancel).run().await;
        assert!(matches!(result, Err(DispatchError::Canceled)));
    }

    #[tokio::test]
    async fn test_terminal_next_is_a_fault() {
        let ctx = RequestContext::new(Echo("hi"));
        let cancel = CancellationToken::new();

        let next = Next::new(None, &ctx, &cancel);
        assert!(!next.has_inner());
        let result = next.run().await;
        assert!(matches!(result, Err(DispatchError::Fault(_))));
    }

    #[tokio::test]
    async fn test_adapter_passes_typed_value_through() {
        let inner = base();
        let ctx = RequestContext::new(Echo("typed"));
        let cancel = CancellationToken::new();
        let adapter = GenericPipeAdapter::<Echo>::new(Arc::new(Passthrough));

        let next = Next::new(Some(&inner), &ctx, &cancel);
        let result = adapter.process(next, &ctx, &cancel).await.unwrap();
        assert_eq!(result.into_value().unwrap(), "echo: typed");
        assert_eq!(Pipe::<Echo>::name(&adapter), "Passthrough");
    }

    #[tokio::test]
    async fn test_adapter_rejects_wrong_value_type() {
        let inner = base();
        let ctx = RequestContext::new(Echo("x"));
        let cancel = CancellationToken::new();
        let adapter = GenericPipeAdapter::<Echo>::new(Arc::new(WrongType));

        let next = Next::new(Some(&inner), &ctx, &cancel);
        let err = adapter.process(next, &ctx, &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::Fault(_)));
        assert!(err.to_string().contains("WrongType"));
    }

    #[tokio::test]
    async fn test_adapter_keeps_failure() {
        let inner = base();
        let ctx = RequestContext::new(Echo("x"));
        let cancel = CancellationToken::new();
        let adapter = GenericPipeAdapter::<Echo>::new(Arc::new(Reject));

        let next = Next::new(Some(&inner), &ctx, &cancel);
        let response = adapter.process(next, &ctx, &cancel).await.unwrap();
        assert_eq!(response.error().unwrap().message(), "Echo rejected");
    }

    #[test]
    fn test_default_pipe_name_is_short_type_name() {
        assert_eq!(GenericPipe::name(&Passthrough), "Passthrough");
        let shared: Arc<dyn GenericPipe> = Arc::new(Reject);
        assert_eq!(shared.name(), "Reject");
    }
}
