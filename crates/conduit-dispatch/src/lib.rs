//! # Conduit Dispatch
//!
//! Request registry and sender for the Conduit request mediator.
//!
//! Registration and dispatch are separate phases:
//!
//! 1. Register handlers and pipes on a [`RegistryBuilder`].
//! 2. [`freeze`](RegistryBuilder::freeze) it into an immutable [`Registry`].
//! 3. Wrap the registry and a resolver in a [`Sender`] and dispatch.
//!
//! Pipelines are composed lazily, once per request type per sender. Concurrent
//! first dispatches of one type share a single composition; a composition that
//! fails is not cached and is retried on the next dispatch.
//!
//! ## Example
//!
//! ```rust
//! use conduit_core::di::Container;
//! use conduit_core::{CancellationToken, FnHandler, Request, RequestContext, Response};
//! use conduit_dispatch::{FreezeOptions, RegistryBuilder, Sender};
//! use conduit_pipeline::stages::TracingPipe;
//!
//! struct Ping(String);
//!
//! impl Request for Ping {
//!     type Response = String;
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RegistryBuilder::new()
//!     .generic_pipe(TracingPipe::new)
//!     .handler::<Ping, _>(|| {
//!         FnHandler::new(|ctx: &RequestContext<Ping>| {
//!             Response::success(format!("Pong: {}", ctx.request().0))
//!         })
//!     })?
//!     .freeze(FreezeOptions::strict())?;
//!
//! let sender = Sender::new(registry, Container::new());
//! sender.warm_up()?;
//!
//! let cancel = CancellationToken::new();
//! let response = tokio_test::block_on(sender.send(Ping("hi".into()), &cancel))?;
//! assert_eq!(response.into_value().as_deref(), Some("Pong: hi"));
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/conduit-dispatch/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod registry;
pub mod sender;

pub use registry::{FreezeOptions, Registry, RegistryBuilder};
pub use sender::{ContextEnricher, Sender};
