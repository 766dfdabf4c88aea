//! The dispatch entry point.
//!
//! A [`Sender`] owns a frozen [`Registry`] and the resolver used to build
//! stages. Each request type's pipeline is composed at most once per sender,
//! on first dispatch or on [`Sender::warm_up`], and reused for every later
//! call. Senders sharing one [`Registry`] each compose their own pipelines.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use conduit_core::di::Resolve;
use conduit_core::{
    CancellationToken, ConfigurationError, DispatchError, Metadata, PipeResult, Request,
    RequestContext,
};
use conduit_pipeline::{outcome_label, Pipeline};
use conduit_telemetry::metrics::record_composition;
use once_cell::sync::OnceCell;

use crate::registry::{ErasedPipeline, Registry};

/// Adds entries to a call's metadata before the pipeline runs.
///
/// Closures taking `(&'static str, &Metadata)` implement this trait.
pub trait ContextEnricher: Send + Sync + 'static {
    /// Enriches the metadata of a request of type `request_type`.
    fn enrich(&self, request_type: &'static str, metadata: &Metadata);
}

impl<F> ContextEnricher for F
where
    F: Fn(&'static str, &Metadata) + Send + Sync + 'static,
{
    fn enrich(&self, request_type: &'static str, metadata: &Metadata) {
        self(request_type, metadata);
    }
}

/// Dispatches requests through their composed pipelines.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```rust
/// use conduit_core::di::Container;
/// use conduit_core::{CancellationToken, FnHandler, Request, RequestContext, Response};
/// use conduit_dispatch::{FreezeOptions, RegistryBuilder, Sender};
///
/// struct Ping(String);
///
/// impl Request for Ping {
///     type Response = String;
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = RegistryBuilder::new()
///     .handler::<Ping, _>(|| {
///         FnHandler::new(|ctx: &RequestContext<Ping>| {
///             Response::success(format!("Pong: {}", ctx.request().0))
///         })
///     })?
///     .freeze(FreezeOptions::default())?;
///
/// let sender = Sender::new(registry, Container::new());
/// let cancel = CancellationToken::new();
/// let response = tokio_test::block_on(sender.send(Ping("hi".into()), &cancel))?;
/// assert_eq!(response.into_value().as_deref(), Some("Pong: hi"));
/// # Ok(())
/// # }
/// ```
pub struct Sender {
    registry: Arc<Registry>,
    resolver: Arc<dyn Resolve>,
    pipelines: HashMap<TypeId, OnceCell<ErasedPipeline>>,
    enrichers: Vec<Arc<dyn ContextEnricher>>,
}

impl Sender {
    /// Creates a sender over a frozen registry.
    ///
    /// The pipeline cache belongs to the sender, not the registry: two
    /// senders over the same `Arc<Registry>` each run the factories once,
    /// with their own resolver.
    pub fn new(registry: impl Into<Arc<Registry>>, resolver: impl Resolve + 'static) -> Self {
        let registry = registry.into();
        let pipelines = registry
            .type_ids()
            .map(|type_id| (type_id, OnceCell::new()))
            .collect();

        Self {
            registry,
            resolver: Arc::new(resolver),
            pipelines,
            enrichers: Vec::new(),
        }
    }

    /// Adds a metadata enricher. Enrichers run in the order they were added.
    #[must_use]
    pub fn with_enricher(mut self, enricher: impl ContextEnricher) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    /// The registry this sender dispatches over.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatches a request with empty metadata.
    ///
    /// # Composition
    ///
    /// The first call for a request type runs its factories synchronously on
    /// the calling thread. Concurrent first callers of the same type park
    /// their thread until it finishes. Factories must not block on I/O and
    /// must not dispatch through this sender.
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> PipeResult<R::Response> {
        self.send_with(request, Metadata::new(), cancel).await
    }

    /// Dispatches a request with caller-provided metadata and cancellation.
    ///
    /// Returns `Err(DispatchError::Canceled)` without composing or running
    /// anything when `cancel` has already fired, and
    /// `Err(DispatchError::Configuration(NotRegistered))` for unknown request
    /// types. Composition behaves as described on [`Sender::send`].
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> PipeResult<R::Response> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Canceled);
        }

        let pipeline = self.pipeline::<R>()?;

        let ctx = RequestContext::with_metadata(request, metadata);
        for enricher in &self.enrichers {
            enricher.enrich(ctx.request_type(), ctx.metadata());
        }

        let result = pipeline.invoke(&ctx, cancel).await;

        tracing::trace!(
            request_type = ctx.request_type(),
            request_id = %ctx.request_id(),
            outcome = outcome_label(&result),
            "Dispatch complete"
        );

        result
    }

    /// Composes the pipeline of every registered request type.
    ///
    /// Returns the number of pipelines composed by this call; already
    /// composed types are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first composition error. Types composed before the error
    /// stay cached.
    pub fn warm_up(&self) -> Result<usize, ConfigurationError> {
        let mut composed = 0;
        for type_id in self.registry.type_ids() {
            let Some(cell) = self.pipelines.get(&type_id) else {
                continue;
            };
            if cell.get().is_some() {
                continue;
            }
            let mut fresh = false;
            cell.get_or_try_init(|| {
                fresh = true;
                self.compose_erased(type_id)
            })?;
            if fresh {
                composed += 1;
            }
        }

        tracing::info!(composed, "Pipelines warmed up");
        Ok(composed)
    }

    /// Checks if the pipeline for `R` has been composed.
    #[must_use]
    pub fn is_composed<R: Request>(&self) -> bool {
        self.pipelines
            .get(&TypeId::of::<R>())
            .is_some_and(|cell| cell.get().is_some())
    }

    fn pipeline<R: Request>(&self) -> Result<&Pipeline<R>, ConfigurationError> {
        let cell = self.pipelines.get(&TypeId::of::<R>()).ok_or(
            ConfigurationError::NotRegistered {
                request: type_name::<R>(),
            },
        )?;

        let erased = cell.get_or_try_init(|| {
            let started = Instant::now();
            let pipeline = self.registry.compose::<R>(self.resolver.as_ref())?;
            record_composition(R::type_name());
            tracing::debug!(
                request_type = R::type_name(),
                elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
                "Pipeline cached"
            );
            Ok::<ErasedPipeline, ConfigurationError>(Box::new(pipeline))
        })?;

        erased
            .downcast_ref::<Pipeline<R>>()
            .ok_or_else(|| ConfigurationError::Resolution {
                type_name: type_name::<R>(),
                reason: "cached pipeline does not match the request type".to_string(),
            })
    }

    fn compose_erased(&self, type_id: TypeId) -> Result<ErasedPipeline, ConfigurationError> {
        let (request_type, full_name) = self
            .registry
            .names_of(type_id)
            .unwrap_or(("<unknown>", "<unknown>"));
        let pipeline = self
            .registry
            .compose_by_id(type_id, self.resolver.as_ref())
            .ok_or(ConfigurationError::NotRegistered { request: full_name })??;
        record_composition(request_type);
        tracing::debug!(request_type, "Pipeline cached");
        Ok(pipeline)
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let composed = self
            .pipelines
            .values()
            .filter(|cell| cell.get().is_some())
            .count();
        f.debug_struct("Sender")
            .field("registry", &self.registry)
            .field("composed", &composed)
            .field("enrichers", &self.enrichers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FreezeOptions, RegistryBuilder};
    use conduit_core::di::Container;
    use conduit_core::{FnHandler, Response};

    struct Ping;

    impl Request for Ping {
        type Response = &'static str;
    }

    struct Unknown;

    impl Request for Unknown {
        type Response = ();
    }

    fn sender() -> Sender {
        let registry = RegistryBuilder::new()
            .handler::<Ping, _>(|| {
                FnHandler::new(|_ctx: &RequestContext<Ping>| Response::success("Pong"))
            })
            .unwrap()
            .freeze(FreezeOptions::default())
            .unwrap();
        Sender::new(registry, Container::new())
    }

    #[tokio::test]
    async fn test_unknown_request_type() {
        let err = sender()
            .send(Unknown, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Configuration(ConfigurationError::NotRegistered { request })
                if request == type_name::<Unknown>()
        ));
    }

    #[tokio::test]
    async fn test_pipeline_cached_after_first_send() {
        let sender = sender();
        assert!(!sender.is_composed::<Ping>());

        let response = sender
            .send(Ping, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.into_value(), Some("Pong"));
        assert!(sender.is_composed::<Ping>());
    }

    #[test]
    fn test_warm_up_counts_fresh_compositions() {
        let sender = sender();
        assert_eq!(sender.warm_up().unwrap(), 1);
        assert_eq!(sender.warm_up().unwrap(), 0);
    }

    #[test]
    fn test_debug() {
        let debug = format!("{:?}", sender());
        assert!(debug.contains("Ping"));
        assert!(debug.contains("composed: 0"));
    }
}
