//! # Conduit Pipeline
//!
//! Pipe primitive and pipeline composition for the Conduit request mediator.
//!
//! Every dispatch of a request type `R` flows through one [`Pipeline<R>`]:
//!
//! ```text
//! caller → generic pipes → specific pipes → handler (or termination) ─┐
//! caller ← generic pipes ← specific pipes ← ──────────────────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Pipe`] | Middleware for one request type |
//! | [`GenericPipe`] | Middleware for every request type |
//! | [`Next`] / [`AnyNext`] | Continuation into the inner chain |
//! | [`HandlerPipe`] | Adapts a handler into the innermost stage |
//! | [`TerminationPipe`] | Fallback stage when no handler is registered |
//! | [`Pipeline`] | The composed, immutable chain |
//!
//! Built-in pipes live in [`stages`].
//!
//! ## Example
//!
//! ```
//! use conduit_core::{CancellationToken, FnHandler, Request, RequestContext, Response};
//! use conduit_pipeline::{stages::TracingPipe, Pipeline};
//!
//! struct Ping(String);
//!
//! impl Request for Ping {
//!     type Response = String;
//! }
//!
//! let pipeline = Pipeline::<Ping>::builder()
//!     .generic(TracingPipe::new())
//!     .handler(FnHandler::new(|ctx: &RequestContext<Ping>| {
//!         Response::success(format!("Pong: {}", ctx.request().0))
//!     }))
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), ["tracing", "handler"]);
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod pipe;
pub mod pipeline;
pub mod stages;
pub mod terminal;

pub use pipe::{AnyNext, AnyValue, BoxFuture, GenericPipe, GenericPipeAdapter, Next, Pipe};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use stages::outcome_label;
pub use terminal::{HandlerPipe, TerminationPipe};
