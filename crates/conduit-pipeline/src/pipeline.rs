//! Pipeline composition.
//!
//! A [`Pipeline`] is the immutable chain for one request type. It is built
//! inside out: the terminal stage is the base continuation, then specific
//! pipes are wrapped around it last-registered first, then generic pipes the
//! same way. The resulting order is:
//!
//! ```text
//! generic[0] → generic[1] → … → specific[0] → specific[1] → … → terminal
//! ```
//!
//! Each pipe's post-processing runs in reverse, so the first generic pipe sees
//! the final outcome.

use std::fmt;
use std::sync::Arc;

use conduit_core::{CancellationToken, Handler, PipeResult, Request, RequestContext};

use crate::pipe::{wrap, Continuation, GenericPipe, GenericPipeAdapter, Next, Pipe};
use crate::terminal::{HandlerPipe, TerminationPipe};

/// The composed chain for request type `R`.
///
/// # Example
///
/// ```
/// use conduit_core::{CancellationToken, FnHandler, Request, RequestContext, Response};
/// use conduit_pipeline::Pipeline;
///
/// struct Ping(String);
///
/// impl Request for Ping {
///     type Response = String;
/// }
///
/// let pipeline = Pipeline::<Ping>::builder()
///     .handler(FnHandler::new(|ctx: &RequestContext<Ping>| {
///         Response::success(format!("Pong: {}", ctx.request().0))
///     }))
///     .build();
///
/// let ctx = RequestContext::new(Ping("hi".into()));
/// let cancel = CancellationToken::new();
/// let response = tokio_test::block_on(pipeline.invoke(&ctx, &cancel)).unwrap();
/// assert_eq!(response.into_value().unwrap(), "Pong: hi");
/// ```
pub struct Pipeline<R: Request> {
    entry: Continuation<R>,
    stages: Vec<&'static str>,
}

impl<R: Request> Pipeline<R> {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder<R> {
        PipelineBuilder::new()
    }

    /// Composes a pipeline from already-constructed stages.
    ///
    /// `generic` and `specific` are in registration order. `terminal` is the
    /// handler adapter or the termination fallback.
    #[must_use]
    pub fn compose(
        generic: Vec<Arc<dyn GenericPipe>>,
        specific: Vec<Arc<dyn Pipe<R>>>,
        terminal: Arc<dyn Pipe<R>>,
    ) -> Self {
        let mut stages = Vec::with_capacity(generic.len() + specific.len() + 1);
        stages.extend(generic.iter().map(|pipe| pipe.name()));
        stages.extend(specific.iter().map(|pipe| pipe.name()));
        stages.push(terminal.name());

        let mut entry = wrap(terminal, None);

        for pipe in specific.into_iter().rev() {
            entry = wrap(pipe, Some(entry));
        }

        for pipe in generic.into_iter().rev() {
            let adapted: Arc<dyn Pipe<R>> = Arc::new(GenericPipeAdapter::<R>::new(pipe));
            entry = wrap(adapted, Some(entry));
        }

        tracing::debug!(
            request_type = R::type_name(),
            stages = ?stages,
            "Pipeline composed"
        );

        Self { entry, stages }
    }

    /// Runs the pipeline for one call.
    ///
    /// Returns `Err(DispatchError::Canceled)` without running any stage when
    /// `cancel` has already fired.
    pub async fn invoke(
        &self,
        ctx: &RequestContext<R>,
        cancel: &CancellationToken,
    ) -> PipeResult<R::Response> {
        Next::new(Some(&self.entry), ctx, cancel).run().await
    }

    /// Stage names, outermost first, terminal last.
    #[must_use]
    pub fn stage_names(&self) -> &[&'static str] {
        &self.stages
    }

    /// Number of stages including the terminal one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false`: a pipeline has at least its terminal stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<R: Request> fmt::Debug for Pipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("request_type", &R::type_name())
            .field("stages", &self.stages)
            .finish()
    }
}

/// Builder for [`Pipeline`].
///
/// Without a handler the pipeline ends in a [`TerminationPipe`].
pub struct PipelineBuilder<R: Request> {
    generic: Vec<Arc<dyn GenericPipe>>,
    specific: Vec<Arc<dyn Pipe<R>>>,
    terminal: Option<Arc<dyn Pipe<R>>>,
}

impl<R: Request> PipelineBuilder<R> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generic: Vec::new(),
            specific: Vec::new(),
            terminal: None,
        }
    }

    /// Appends a generic pipe.
    #[must_use]
    pub fn generic<P: GenericPipe>(mut self, pipe: P) -> Self {
        self.generic.push(Arc::new(pipe));
        self
    }

    /// Appends a request-specific pipe.
    #[must_use]
    pub fn pipe<P: Pipe<R>>(mut self, pipe: P) -> Self {
        self.specific.push(Arc::new(pipe));
        self
    }

    /// Sets the handler. A later call replaces an earlier one.
    #[must_use]
    pub fn handler<H: Handler<R>>(mut self, handler: H) -> Self {
        self.terminal = Some(Arc::new(HandlerPipe::new(handler)));
        self
    }

    /// Composes the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline<R> {
        let terminal = self
            .terminal
            .unwrap_or_else(|| Arc::new(TerminationPipe::<R>::new()));
        Pipeline::compose(self.generic, self.specific, terminal)
    }
}

impl<R: Request> Default for PipelineBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{AnyNext, AnyValue, BoxFuture};
    use conduit_core::{Context, FnHandler, Response};

    struct Ping(String);

    impl Request for Ping {
        type Response = String;
    }

    struct Audit;

    impl GenericPipe for Audit {
        fn name(&self) -> &'static str {
            "audit"
        }

        fn process<'a>(
            &'a self,
            next: AnyNext<'a>,
            ctx: &'a dyn Context,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<AnyValue>> {
            Box::pin(async move {
                ctx.metadata().insert("audited", true);
                next.run().await
            })
        }
    }

    struct Shout;

    impl Pipe<Ping> for Shout {
        fn process<'a>(
            &'a self,
            next: Next<'a, Ping>,
            _ctx: &'a RequestContext<Ping>,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, PipeResult<String>> {
            Box::pin(async move { Ok(next.run().await?.map(|s| s.to_uppercase())) })
        }
    }

    fn pong() -> impl Handler<Ping> {
        FnHandler::new(|ctx: &RequestContext<Ping>| {
            Response::success(format!("Pong: {}", ctx.request().0))
        })
    }

    #[test]
    fn test_stage_names_in_order() {
        let pipeline = Pipeline::<Ping>::builder()
            .generic(Audit)
            .pipe(Shout)
            .handler(pong())
            .build();

        assert_eq!(pipeline.stage_names(), ["audit", "Shout", "handler"]);
        assert_eq!(pipeline.len(), 3);
        assert!(!pipeline.is_empty());
    }

    #[test]
    fn test_zero_pipes_calls_terminal() {
        let pipeline = Pipeline::<Ping>::builder().handler(pong()).build();
        assert_eq!(pipeline.stage_names(), ["handler"]);

        let ctx = RequestContext::new(Ping("hi".into()));
        let cancel = CancellationToken::new();
        let response = tokio_test::block_on(pipeline.invoke(&ctx, &cancel)).unwrap();
        assert_eq!(response.into_value().unwrap(), "Pong: hi");
    }

    #[tokio::test]
    async fn test_generic_and_specific_pipes_run() {
        let pipeline = Pipeline::<Ping>::builder()
            .generic(Audit)
            .pipe(Shout)
            .handler(pong())
            .build();

        let ctx = RequestContext::new(Ping("hi".into()));
        let cancel = CancellationToken::new();
        let response = pipeline.invoke(&ctx, &cancel).await.unwrap();

        assert_eq!(response.into_value().unwrap(), "PONG: HI");
        assert_eq!(ctx.metadata().get_as::<bool>("audited"), Some(true));
    }

    #[tokio::test]
    async fn test_missing_handler_uses_termination() {
        let pipeline = Pipeline::<Ping>::builder().pipe(Shout).build();
        assert_eq!(pipeline.stage_names(), ["Shout", "termination"]);

        let ctx = RequestContext::new(Ping("hi".into()));
        let cancel = CancellationToken::new();
        let response = pipeline.invoke(&ctx, &cancel).await.unwrap();
        assert_eq!(
            response.error().unwrap().code(),
            "generic.internal_server_error"
        );
    }

    #[test]
    fn test_debug_lists_stages() {
        let pipeline = Pipeline::<Ping>::builder().build();
        let debug = format!("{pipeline:?}");
        assert!(debug.contains("Ping"));
        assert!(debug.contains("termination"));
    }
}
