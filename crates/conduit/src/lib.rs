//! # Conduit
//!
//! **In-process typed request mediator with a composable pipe pipeline**
//!
//! Conduit decouples callers from handlers: a caller sends a strongly-typed
//! request to a [`Sender`](dispatch::Sender), which routes it through an ordered
//! chain of pipes to the one handler registered for that request type.
//!
//! - **Typed outcomes**: every request names its response type; results are
//!   `Success`, `Failure(Error)`, `Canceled`, configuration errors or faults
//! - **Onion pipeline**: generic pipes wrap every request type, specific pipes
//!   wrap one; each can run code before and after the rest of the chain
//! - **Compose once**: a request type's pipeline is built on first use and
//!   cached for the sender's lifetime
//! - **Observability built in**: tracing spans, Prometheus metrics, retry and
//!   timeout pipes driven by configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use conduit::prelude::*;
//!
//! struct Ping(String);
//!
//! impl Request for Ping {
//!     type Response = String;
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RegistryBuilder::new().handler::<Ping, _>(|| {
//!         FnHandler::new(|ctx: &RequestContext<Ping>| {
//!             Response::success(format!("Pong: {}", ctx.request().0))
//!         })
//!     })?;
//!
//!     let conduit = Conduit::builder().registry(registry).build()?;
//!
//!     let response = conduit
//!         .send(Ping("hi".into()), &CancellationToken::new())
//!         .await?;
//!     assert_eq!(response.into_value().as_deref(), Some("Pong: hi"));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! send → Tracing → Metrics → Retry → Timeout → specific pipes → Handler
//!                                                                  ↓
//! result ← Tracing ← Metrics ← Retry ← Timeout ← ────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/conduit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{log_config, metrics_config, BootstrapError, Conduit, ConduitBuilder};

// Re-export core types
pub use conduit_core as core;

// Re-export pipe and pipeline types
pub use conduit_pipeline as pipeline;

// Re-export registry and sender types
pub use conduit_dispatch as dispatch;

// Re-export configuration types
pub use conduit_config as config;

// Re-export telemetry types
pub use conduit_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use conduit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{BootstrapError, Conduit, ConduitBuilder};

    pub use conduit_core::{
        CancellationToken, ConfigurationError, Context, DispatchError, Error, ErrorCategory,
        FnHandler, Handler, Metadata, PipeResult, Request, RequestContext, RequestId, Response,
        Unit,
    };

    // Re-export DI types
    pub use conduit_core::di::{Container, Resolve, ResolveExt};

    // Re-export pipe types
    pub use conduit_pipeline::stages::{
        MetricsPipe, RetryPipe, TimeoutPipe, TracingPipe, Validate, ValidationPipe,
    };
    pub use conduit_pipeline::{AnyNext, AnyValue, BoxFuture, GenericPipe, Next, Pipe};

    // Re-export dispatch types
    pub use conduit_dispatch::{ContextEnricher, FreezeOptions, RegistryBuilder, Sender};

    // Re-export configuration types
    pub use conduit_config::{ConduitConfig, ConfigLoader};
}
