//! The success/failure outcome model.

use crate::error::{DispatchError, Error};
use serde::{Deserialize, Serialize};

/// Result of running a pipe, a handler, or a whole pipeline.
///
/// `Ok` carries the domain outcome; `Err` carries cancellation, configuration
/// failures and unexpected faults.
pub type PipeResult<T> = Result<Response<T>, DispatchError>;

/// The void payload for requests that produce no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit;

/// Outcome of a request: either a success value or a domain [`Error`].
///
/// Exactly one of value/error is populated, so [`is_success`](Self::is_success)
/// and [`is_failure`](Self::is_failure) are always complementary. No
/// conversion on this type drops an error or invents a value.
///
/// # Example
///
/// ```
/// use conduit_core::{Error, Response};
///
/// let ok: Response<u32> = Response::success(7);
/// assert!(ok.is_success());
/// assert_eq!(ok.value(), Some(&7));
///
/// let failed: Response<u32> = Error::not_found("nope").into();
/// assert!(failed.is_failure());
/// assert_eq!(failed.error().unwrap().message(), "nope");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response<T> {
    /// The request succeeded.
    Success(T),
    /// The request failed with a domain error.
    Failure(Error),
}

impl<T> Response<T> {
    /// Creates a success outcome.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    /// Creates a failure outcome.
    #[must_use]
    pub const fn failure(error: Error) -> Self {
        Self::Failure(error)
    }

    /// Returns `true` if this is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` if this is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns the error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Consumes the response, returning the success value.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Consumes the response, returning the error.
    #[must_use]
    pub fn into_error(self) -> Option<Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }

    /// Maps the success value, keeping a failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        match self {
            Self::Success(value) => Response::Success(f(value)),
            Self::Failure(error) => Response::Failure(error),
        }
    }

    /// Chains another fallible step onto a success.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Response<U>) -> Response<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(error) => Response::Failure(error),
        }
    }

    /// Re-types a failure. Returns `Err(self)` when the response is a success,
    /// since a success value cannot be converted without a mapping.
    pub fn cast_failure<U>(self) -> Result<Response<U>, Self> {
        match self {
            Self::Failure(error) => Ok(Response::Failure(error)),
            success @ Self::Success(_) => Err(success),
        }
    }
}

impl Response<Unit> {
    /// The void success outcome.
    #[must_use]
    pub const fn ok() -> Self {
        Self::Success(Unit)
    }
}

impl<T> From<Error> for Response<T> {
    fn from(error: Error) -> Self {
        Self::Failure(error)
    }
}

impl<T> From<Result<T, Error>> for Response<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}
