//! Request registry.
//!
//! Registration happens on a [`RegistryBuilder`]; [`RegistryBuilder::freeze`]
//! turns it into an immutable [`Registry`] exactly once. The registry holds
//! factories, not instances: pipelines are built from it by the
//! [`Sender`](crate::Sender), lazily or on [`warm_up`](crate::Sender::warm_up).
//! One registry can back several senders; each sender composes and caches
//! its own pipelines, so every factory runs once per sender.
//!
//! Configuration errors name request types by their full path
//! ([`std::any::type_name`]), so `billing::Ping` and `chat::Ping` stay
//! distinguishable. Logs and [`Registry::request_types`] use the short
//! [`Request::type_name`].
//!
//! # Example
//!
//! ```rust
//! use conduit_core::{FnHandler, Request, RequestContext, Response};
//! use conduit_dispatch::{FreezeOptions, RegistryBuilder};
//!
//! struct Ping(String);
//!
//! impl Request for Ping {
//!     type Response = String;
//! }
//!
//! # fn main() -> Result<(), conduit_core::ConfigurationError> {
//! let registry = RegistryBuilder::new()
//!     .handler::<Ping, _>(|| {
//!         FnHandler::new(|ctx: &RequestContext<Ping>| {
//!             Response::success(format!("Pong: {}", ctx.request().0))
//!         })
//!     })?
//!     .freeze(FreezeOptions::default())?;
//!
//! assert!(registry.has_handler::<Ping>());
//! # Ok(())
//! # }
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use conduit_core::di::{Resolve, ResolveExt};
use conduit_core::{ConfigurationError, Handler, Request};
use conduit_pipeline::{GenericPipe, HandlerPipe, Pipe, Pipeline, TerminationPipe};

/// Builds an instance from the sender's resolver.
type Factory<T> = Box<dyn Fn(&dyn Resolve) -> Result<T, ConfigurationError> + Send + Sync>;

/// Factory for a handler stage or a specific pipe of request type `R`.
type PipeFactory<R> = Factory<Arc<dyn Pipe<R>>>;

type GenericPipeFactory = Factory<Arc<dyn GenericPipe>>;

/// A pipe factory with its request type erased. Always a `PipeFactory<R>`
/// for the entry's `R`.
type ErasedFactory = Box<dyn Any + Send + Sync>;

/// A composed `Pipeline<R>` with its request type erased.
pub(crate) type ErasedPipeline = Box<dyn Any + Send + Sync>;

type ComposeFn = fn(&Registry, &dyn Resolve) -> Result<ErasedPipeline, ConfigurationError>;

/// Registration of one request type.
struct RequestEntry {
    type_name: &'static str,
    full_name: &'static str,
    handler: Option<ErasedFactory>,
    pipes: Vec<ErasedFactory>,
    compose: ComposeFn,
}

impl RequestEntry {
    fn new<R: Request>() -> Self {
        Self {
            type_name: R::type_name(),
            full_name: type_name::<R>(),
            handler: None,
            pipes: Vec::new(),
            compose: compose_erased::<R>,
        }
    }
}

fn compose_erased<R: Request>(
    registry: &Registry,
    resolver: &dyn Resolve,
) -> Result<ErasedPipeline, ConfigurationError> {
    let pipeline = registry.compose::<R>(resolver)?;
    Ok(Box::new(pipeline))
}

fn typed<R: Request>(factory: &ErasedFactory) -> Result<&PipeFactory<R>, ConfigurationError> {
    factory
        .downcast_ref::<PipeFactory<R>>()
        .ok_or_else(|| ConfigurationError::Resolution {
            type_name: type_name::<R>(),
            reason: "registered factory does not match the request type".to_string(),
        })
}

/// Options applied when freezing a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreezeOptions {
    /// Fail the freeze when a request type has no handler, instead of
    /// logging a warning.
    pub strict_handlers: bool,
}

impl FreezeOptions {
    /// Options that reject request types without a handler.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            strict_handlers: true,
        }
    }
}

/// Open registration phase.
///
/// Registration order matters: pipes run in the order they were added, with
/// all generic pipes outside all specific pipes.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<TypeId, RequestEntry>,
    order: Vec<TypeId>,
    generic: Vec<GenericPipeFactory>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry<R: Request>(&mut self) -> &mut RequestEntry {
        let order = &mut self.order;
        self.entries.entry(TypeId::of::<R>()).or_insert_with(|| {
            order.push(TypeId::of::<R>());
            RequestEntry::new::<R>()
        })
    }

    fn insert_handler<R: Request>(
        mut self,
        factory: PipeFactory<R>,
    ) -> Result<Self, ConfigurationError> {
        let entry = self.entry::<R>();
        if entry.handler.is_some() {
            return Err(ConfigurationError::DuplicateHandler {
                request: type_name::<R>(),
            });
        }
        entry.handler = Some(Box::new(factory));
        Ok(self)
    }

    fn insert_pipe<R: Request>(mut self, factory: PipeFactory<R>) -> Self {
        self.entry::<R>().pipes.push(Box::new(factory));
        self
    }

    /// Registers the handler for `R`. The factory runs once per composition.
    ///
    /// Factories run synchronously on the dispatching thread while other
    /// first callers of `R` wait. Keep them short, and never block on I/O or
    /// dispatch through the sender from inside one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateHandler`] if `R` already has a
    /// handler.
    pub fn handler<R, H>(
        self,
        factory: impl Fn() -> H + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.insert_handler::<R>(Box::new(move |_: &dyn Resolve| {
            Ok(Arc::new(HandlerPipe::new(factory())) as Arc<dyn Pipe<R>>)
        }))
    }

    /// Registers the handler for `R` with a factory that uses the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateHandler`] if `R` already has a
    /// handler.
    pub fn handler_with<R, H>(
        self,
        factory: impl Fn(&dyn Resolve) -> Result<H, ConfigurationError> + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.insert_handler::<R>(Box::new(move |resolver: &dyn Resolve| {
            let handler = factory(resolver)?;
            Ok(Arc::new(HandlerPipe::new(handler)) as Arc<dyn Pipe<R>>)
        }))
    }

    /// Registers `H`, resolved from the resolver, as the handler for `R`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateHandler`] if `R` already has a
    /// handler.
    pub fn handler_resolved<R, H>(self) -> Result<Self, ConfigurationError>
    where
        R: Request,
        H: Handler<R>,
    {
        self.insert_handler::<R>(Box::new(|resolver: &dyn Resolve| {
            let handler = resolver.resolve_required::<H>()?;
            Ok(Arc::new(HandlerPipe::new(handler)) as Arc<dyn Pipe<R>>)
        }))
    }

    /// Appends a pipe specific to `R`.
    #[must_use]
    pub fn pipe<R, P>(self, factory: impl Fn() -> P + Send + Sync + 'static) -> Self
    where
        R: Request,
        P: Pipe<R>,
    {
        self.insert_pipe::<R>(Box::new(move |_: &dyn Resolve| {
            Ok(Arc::new(factory()) as Arc<dyn Pipe<R>>)
        }))
    }

    /// Appends a pipe specific to `R`, built with the resolver.
    #[must_use]
    pub fn pipe_with<R, P>(
        self,
        factory: impl Fn(&dyn Resolve) -> Result<P, ConfigurationError> + Send + Sync + 'static,
    ) -> Self
    where
        R: Request,
        P: Pipe<R>,
    {
        self.insert_pipe::<R>(Box::new(move |resolver: &dyn Resolve| {
            Ok(Arc::new(factory(resolver)?) as Arc<dyn Pipe<R>>)
        }))
    }

    /// Appends `P`, resolved from the resolver, as a pipe specific to `R`.
    #[must_use]
    pub fn pipe_resolved<R, P>(self) -> Self
    where
        R: Request,
        P: Pipe<R>,
    {
        self.insert_pipe::<R>(Box::new(|resolver: &dyn Resolve| {
            Ok(resolver.resolve_required::<P>()? as Arc<dyn Pipe<R>>)
        }))
    }

    /// Appends a pipe applied to every request type.
    #[must_use]
    pub fn generic_pipe<P: GenericPipe>(
        mut self,
        factory: impl Fn() -> P + Send + Sync + 'static,
    ) -> Self {
        self.generic.push(Box::new(move |_: &dyn Resolve| {
            Ok(Arc::new(factory()) as Arc<dyn GenericPipe>)
        }));
        self
    }

    /// Appends a generic pipe built with the resolver.
    #[must_use]
    pub fn generic_pipe_with<P: GenericPipe>(
        mut self,
        factory: impl Fn(&dyn Resolve) -> Result<P, ConfigurationError> + Send + Sync + 'static,
    ) -> Self {
        self.generic.push(Box::new(move |resolver: &dyn Resolve| {
            Ok(Arc::new(factory(resolver)?) as Arc<dyn GenericPipe>)
        }));
        self
    }

    /// Appends `P`, resolved from the resolver, as a generic pipe.
    #[must_use]
    pub fn generic_pipe_resolved<P: GenericPipe>(mut self) -> Self {
        self.generic.push(Box::new(|resolver: &dyn Resolve| {
            Ok(resolver.resolve_required::<P>()? as Arc<dyn GenericPipe>)
        }));
        self
    }

    /// Registers `R` without a handler or pipes.
    ///
    /// Dispatching `R` then answers with the internal-error fallback, unless
    /// a handler is registered later.
    #[must_use]
    pub fn request<R: Request>(mut self) -> Self {
        self.entry::<R>();
        self
    }

    /// Ends registration.
    ///
    /// Request types without a handler are logged as warnings, or rejected
    /// when `options.strict_handlers` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingHandlers`] in strict mode when any
    /// request type lacks a handler.
    pub fn freeze(self, options: FreezeOptions) -> Result<Registry, ConfigurationError> {
        let registry = Registry {
            entries: self.entries,
            order: self.order,
            generic: self.generic,
        };

        let missing = registry.missing_handlers();
        if !missing.is_empty() {
            if options.strict_handlers {
                return Err(ConfigurationError::MissingHandlers { requests: missing });
            }
            for request_type in &missing {
                tracing::warn!(
                    request_type = %request_type,
                    "No handler registered, requests will fail with an internal error"
                );
            }
        }

        tracing::debug!(
            request_types = registry.len(),
            generic_pipes = registry.generic.len(),
            "Registry frozen"
        );

        Ok(registry)
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("request_types", &self.order.len())
            .field("generic_pipes", &self.generic.len())
            .finish()
    }
}

/// Frozen registration: request entries and generic pipes.
///
/// Immutable. Several senders may share one registry behind an `Arc`, but
/// composition is once per sender: each sender runs the factories with its
/// own resolver and caches its own pipelines.
pub struct Registry {
    entries: HashMap<TypeId, RequestEntry>,
    order: Vec<TypeId>,
    generic: Vec<GenericPipeFactory>,
}

impl Registry {
    /// Checks if `R` is registered.
    #[must_use]
    pub fn contains<R: Request>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }

    /// Checks if `R` is registered with a handler.
    #[must_use]
    pub fn has_handler<R: Request>(&self) -> bool {
        self.entries
            .get(&TypeId::of::<R>())
            .is_some_and(|entry| entry.handler.is_some())
    }

    /// Number of registered request types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no request type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of generic pipes.
    #[must_use]
    pub fn generic_pipe_count(&self) -> usize {
        self.generic.len()
    }

    /// Registered request type names, in registration order.
    pub fn request_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.type_name)
    }

    /// Fully-qualified names of request types without a handler, in
    /// registration order.
    #[must_use]
    pub fn missing_handlers(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.handler.is_none())
            .map(|entry| entry.full_name)
            .collect()
    }

    /// Checks that every registered request type has a handler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingHandlers`] listing the offenders.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let missing = self.missing_handlers();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::MissingHandlers { requests: missing })
        }
    }

    /// Composes the pipeline for `R`, running every relevant factory once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotRegistered`] if `R` is unknown, or the
    /// first error returned by a factory.
    pub fn compose<R: Request>(
        &self,
        resolver: &dyn Resolve,
    ) -> Result<Pipeline<R>, ConfigurationError> {
        let entry = self.entries.get(&TypeId::of::<R>()).ok_or(
            ConfigurationError::NotRegistered {
                request: type_name::<R>(),
            },
        )?;

        let generic = self
            .generic
            .iter()
            .map(|factory| factory(resolver))
            .collect::<Result<Vec<_>, _>>()?;

        let specific = entry
            .pipes
            .iter()
            .map(|factory| typed::<R>(factory).and_then(|factory| factory(resolver)))
            .collect::<Result<Vec<_>, _>>()?;

        let terminal = match &entry.handler {
            Some(factory) => typed::<R>(factory)?(resolver)?,
            None => Arc::new(TerminationPipe::<R>::new()),
        };

        Ok(Pipeline::compose(generic, specific, terminal))
    }

    pub(crate) fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.order.iter().copied()
    }

    /// Short and fully-qualified names of a registered request type.
    pub(crate) fn names_of(&self, type_id: TypeId) -> Option<(&'static str, &'static str)> {
        self.entries
            .get(&type_id)
            .map(|entry| (entry.type_name, entry.full_name))
    }

    pub(crate) fn compose_by_id(
        &self,
        type_id: TypeId,
        resolver: &dyn Resolve,
    ) -> Option<Result<ErasedPipeline, ConfigurationError>> {
        self.entries
            .get(&type_id)
            .map(|entry| (entry.compose)(self, resolver))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("request_types", &self.request_types().collect::<Vec<_>>())
            .field("generic_pipes", &self.generic.len())
            .finish()
    }
}
