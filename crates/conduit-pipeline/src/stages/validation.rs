//! Request validation pipe.
//!
//! Requests that implement [`Validate`] can be guarded by a
//! [`ValidationPipe`]: an invalid request short-circuits with the validation
//! error and the handler never runs.
//!
//! # Example
//!
//! ```
//! use conduit_core::{Error, Request};
//! use conduit_pipeline::stages::Validate;
//!
//! struct CreateUser {
//!     name: String,
//! }
//!
//! impl Request for CreateUser {
//!     type Response = u64;
//! }
//!
//! impl Validate for CreateUser {
//!     fn validate(&self) -> Result<(), Error> {
//!         if self.name.is_empty() {
//!             return Err(Error::validation("name must not be empty").with_detail("field", "name"));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::marker::PhantomData;

use conduit_core::{CancellationToken, Error, PipeResult, Request, RequestContext, Response};

use crate::pipe::{BoxFuture, Next, Pipe};

/// Self-validation for request types.
pub trait Validate {
    /// Returns the validation failure, if any.
    fn validate(&self) -> Result<(), Error>;
}

/// Specific pipe that rejects requests failing [`Validate::validate`].
pub struct ValidationPipe<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R> ValidationPipe<R> {
    /// Creates a validation pipe.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for ValidationPipe<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Request + Validate> Pipe<R> for ValidationPipe<R> {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        next: Next<'a, R>,
        ctx: &'a RequestContext<R>,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, PipeResult<R::Response>> {
        Box::pin(async move {
            if let Err(error) = ctx.request().validate() {
                tracing::debug!(
                    request_type = ctx.request_type(),
                    request_id = %ctx.request_id(),
                    error.code = error.code(),
                    "Request rejected by validation"
                );
                return Ok(Response::failure(error));
            }
            next.run().await
        })
    }
}
