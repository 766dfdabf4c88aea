//! # Conduit Core
//!
//! Core types and traits for the Conduit request mediator.
//!
//! This crate provides the foundational types used throughout Conduit:
//!
//! - [`Request`] - A typed request bound to exactly one response type
//! - [`Response`] - Success/failure outcome container
//! - [`Error`] - Structured domain failure (code, category, message)
//! - [`DispatchError`] - Exceptional outcomes: configuration, cancellation, faults
//! - [`RequestContext`] - Per-call wrapper around a request plus a metadata bag
//! - [`Handler`] - Terminal handler trait
//! - [`di::Container`] - Type-keyed resolution capability

#![doc(html_root_url = "https://docs.rs/conduit-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod di;
mod error;
mod handler;
mod outcome;
mod request;

pub use context::{Context, Metadata, RequestContext, RequestId};
pub use error::{ConfigurationError, DispatchError, Error, ErrorCategory};
pub use handler::{FnHandler, Handler};
pub use outcome::{PipeResult, Response, Unit};
pub use request::{short_type_name, Request};

/// Re-exported so downstream crates share one cancellation token type.
pub use tokio_util::sync::CancellationToken;
