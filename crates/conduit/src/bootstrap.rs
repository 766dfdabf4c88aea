//! Configuration-driven sender bootstrap.
//!
//! [`Conduit::builder`] takes a [`ConduitConfig`], a [`RegistryBuilder`] and a
//! resolver and produces a ready [`Sender`]:
//!
//! 1. Validate the configuration
//! 2. Optionally initialize logging and metrics
//! 3. Append the built-in generic pipes the configuration asks for
//! 4. Freeze the registry, strict if `dispatch.strict_handlers` is set
//! 5. Warm up every pipeline if `dispatch.eager_composition` is set
//!
//! Built-in pipes are appended after the caller's generic pipes, in this
//! order: tracing, metrics, retry, timeout. The timeout therefore bounds each
//! retry attempt separately.

use std::sync::Arc;
use std::time::Duration;

use conduit_config::{ConduitConfig, ConfigError, LogFormat, TelemetryConfigSection};
use conduit_core::di::{Container, Resolve};
use conduit_core::{CancellationToken, ConfigurationError, Metadata, PipeResult, Request};
use conduit_dispatch::{ContextEnricher, FreezeOptions, RegistryBuilder, Sender};
use conduit_pipeline::stages::{MetricsPipe, RetryPipe, TimeoutPipe, TracingPipe};
use conduit_telemetry::{init_telemetry, LogConfig, MetricsConfig, Telemetry, TelemetryError};
use thiserror::Error;

/// Errors raised while bootstrapping a [`Conduit`].
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error("telemetry initialization failed: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Registration, freeze or warm-up failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// A bootstrapped mediator: the sender plus the configuration it was built
/// from.
pub struct Conduit {
    sender: Arc<Sender>,
    config: ConduitConfig,
    telemetry: Option<Telemetry>,
}

impl Conduit {
    /// Creates a new bootstrap builder.
    #[must_use]
    pub fn builder() -> ConduitBuilder {
        ConduitBuilder::new()
    }

    /// The shared sender.
    #[must_use]
    pub fn sender(&self) -> &Arc<Sender> {
        &self.sender
    }

    /// The configuration this instance was built from.
    #[must_use]
    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// Telemetry handles, if telemetry was initialized.
    #[must_use]
    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    /// Dispatches a request. See [`Sender::send`].
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> PipeResult<R::Response> {
        self.sender.send(request, cancel).await
    }

    /// Dispatches a request with metadata. See [`Sender::send_with`].
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> PipeResult<R::Response> {
        self.sender.send_with(request, metadata, cancel).await
    }
}

impl std::fmt::Debug for Conduit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conduit")
            .field("sender", &self.sender)
            .field("config", &self.config)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

/// Builder for [`Conduit`].
///
/// # Example
///
/// ```rust
/// use conduit::prelude::*;
///
/// struct Ping(String);
///
/// impl Request for Ping {
///     type Response = String;
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = RegistryBuilder::new().handler::<Ping, _>(|| {
///     FnHandler::new(|ctx: &RequestContext<Ping>| {
///         Response::success(format!("Pong: {}", ctx.request().0))
///     })
/// })?;
///
/// let conduit = Conduit::builder()
///     .config(ConduitConfig::default())
///     .registry(registry)
///     .build()?;
///
/// let cancel = CancellationToken::new();
/// let response = tokio_test::block_on(conduit.send(Ping("hi".into()), &cancel))?;
/// assert_eq!(response.into_value().as_deref(), Some("Pong: hi"));
/// # Ok(())
/// # }
/// ```
pub struct ConduitBuilder {
    config: ConduitConfig,
    registry: RegistryBuilder,
    resolver: Option<Arc<dyn Resolve>>,
    enrichers: Vec<Box<dyn FnOnce(Sender) -> Sender + Send>>,
    init_telemetry: bool,
}

impl ConduitBuilder {
    /// Creates a builder with default configuration and an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ConduitConfig::default(),
            registry: RegistryBuilder::new(),
            resolver: None,
            enrichers: Vec::new(),
            init_telemetry: false,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ConduitConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the registrations.
    #[must_use]
    pub fn registry(mut self, registry: RegistryBuilder) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the resolver. Defaults to an empty [`Container`].
    #[must_use]
    pub fn resolver(mut self, resolver: impl Resolve + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Adds a metadata enricher to the sender.
    #[must_use]
    pub fn enricher(mut self, enricher: impl ContextEnricher) -> Self {
        self.enrichers
            .push(Box::new(move |sender| sender.with_enricher(enricher)));
        self
    }

    /// Installs the global logging subscriber and metrics recorder on build.
    ///
    /// Off by default. Installation is process-wide and can happen once.
    #[must_use]
    pub fn init_telemetry(mut self, enabled: bool) -> Self {
        self.init_telemetry = enabled;
        self
    }

    /// Validates, freezes and builds.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the configuration is invalid, telemetry
    /// fails to initialize, a strict freeze finds missing handlers, or eager
    /// composition fails.
    pub fn build(self) -> Result<Conduit, BootstrapError> {
        let config = self.config;
        config.validate()?;

        let telemetry = if self.init_telemetry {
            let section = &config.telemetry;
            Some(init_telemetry(&log_config(section), &metrics_config(section))?)
        } else {
            None
        };

        let registry = install_stages(self.registry, &config).freeze(FreezeOptions {
            strict_handlers: config.dispatch.strict_handlers,
        })?;

        let sender = match self.resolver {
            Some(resolver) => Sender::new(registry, resolver),
            None => Sender::new(registry, Container::new()),
        };
        let sender = self
            .enrichers
            .into_iter()
            .fold(sender, |sender, add| add(sender));

        if config.dispatch.eager_composition {
            sender.warm_up()?;
        }

        tracing::info!(
            service.name = %config.telemetry.service_name,
            environment = %config.telemetry.environment,
            request_types = sender.registry().len(),
            generic_pipes = sender.registry().generic_pipe_count(),
            eager = config.dispatch.eager_composition,
            "Conduit ready"
        );

        Ok(Conduit {
            sender: Arc::new(sender),
            config,
            telemetry,
        })
    }
}

impl Default for ConduitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConduitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConduitBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("resolver", &self.resolver.is_some())
            .field("enrichers", &self.enrichers.len())
            .field("init_telemetry", &self.init_telemetry)
            .finish()
    }
}

fn install_stages(registry: RegistryBuilder, config: &ConduitConfig) -> RegistryBuilder {
    let mut registry = registry;
    let telemetry = &config.telemetry;
    let dispatch = &config.dispatch;

    if telemetry.logging.enabled {
        registry = registry.generic_pipe(TracingPipe::new);
    }
    if telemetry.metrics.enabled {
        registry = registry.generic_pipe(MetricsPipe::new);
    }
    if dispatch.retry.enabled {
        let max_attempts = dispatch.retry.max_attempts;
        let backoff = Duration::from_millis(dispatch.retry.backoff_ms);
        registry = registry.generic_pipe(move || RetryPipe::new(max_attempts, backoff));
    }
    if let Some(timeout_ms) = dispatch.default_timeout_ms {
        let timeout = Duration::from_millis(timeout_ms);
        registry = registry.generic_pipe(move || TimeoutPipe::new(timeout));
    }
    registry
}

/// Logging settings for the `telemetry` section.
pub fn log_config(section: &TelemetryConfigSection) -> LogConfig {
    LogConfig {
        enabled: section.logging.enabled,
        level: section.logging.level.clone(),
        json_format: section.logging.format == LogFormat::Json,
        file_line_info: section.logging.include_location,
        service_name: section.service_name.clone(),
        ..LogConfig::default()
    }
}

/// Metrics settings for the `telemetry` section.
pub fn metrics_config(section: &TelemetryConfigSection) -> MetricsConfig {
    MetricsConfig {
        enabled: section.metrics.enabled,
        service_name: section.service_name.clone(),
        duration_buckets: section.metrics.histogram_buckets.clone(),
    }
}
