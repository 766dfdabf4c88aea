//! Error types for Conduit.
//!
//! Conduit separates three kinds of "not a success":
//!
//! | Kind | Type | Carried as |
//! |---|---|---|
//! | Domain failure | [`Error`] | `Ok(Response::Failure(error))` |
//! | Configuration failure | [`ConfigurationError`] | `Err(DispatchError::Configuration(..))` |
//! | Cancellation | - | `Err(DispatchError::Canceled)` |
//! | Unexpected fault | `anyhow::Error` | `Err(DispatchError::Fault(..))` |
//!
//! Domain failures are expected business outcomes and are never raised as
//! faults. Faults raised by a pipe or handler propagate to the caller
//! unchanged; the core only ever converts the deliberate "no handler" case
//! into a structured failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error as ThisError;

/// Categories of domain failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The request was malformed or semantically invalid.
    BadRequest,
    /// Request validation failed.
    Validation,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is not allowed to perform the request.
    Forbidden,
    /// A referenced resource does not exist.
    NotFound,
    /// The request conflicts with current state.
    Conflict,
    /// A downstream dependency did not answer in time.
    Timeout,
    /// A downstream dependency is temporarily unavailable.
    Unavailable,
    /// Internal error, including "no handler registered".
    Internal,
}

impl ErrorCategory {
    /// Returns the stable snake_case name of this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }

    /// Returns `true` for categories where repeating the request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of a domain-level failure.
///
/// An `Error` is a value, not a fault: handlers and pipes return it inside
/// [`Response::Failure`](crate::Response::Failure).
///
/// # Example
///
/// ```
/// use conduit_core::{Error, ErrorCategory};
///
/// let err = Error::not_found("user 42 does not exist").with_detail("user_id", 42);
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.code(), "generic.not_found");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ThisError)]
#[error("{code}: {message}")]
pub struct Error {
    code: String,
    category: ErrorCategory,
    message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<String, serde_json::Value>,
}

impl Error {
    /// Creates an error with an explicit code, category and message.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            category,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Generic bad request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("generic.bad_request", ErrorCategory::BadRequest, message)
    }

    /// Validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("generic.validation", ErrorCategory::Validation, message)
    }

    /// Caller is not authenticated.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("generic.unauthorized", ErrorCategory::Unauthorized, message)
    }

    /// Caller lacks permission.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("generic.forbidden", ErrorCategory::Forbidden, message)
    }

    /// Resource not found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("generic.not_found", ErrorCategory::NotFound, message)
    }

    /// State conflict.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("generic.conflict", ErrorCategory::Conflict, message)
    }

    /// Downstream timeout.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("generic.timeout", ErrorCategory::Timeout, message)
    }

    /// Downstream temporarily unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("generic.unavailable", ErrorCategory::Unavailable, message)
    }

    /// The internal server error returned when no handler is registered.
    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::new(
            "generic.internal_server_error",
            ErrorCategory::Internal,
            "An internal error occurred while processing the request",
        )
    }

    /// Attaches a structured detail to the error.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns the stable error code (e.g. `"generic.not_found"`).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a single detail value.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.get(key)
    }

    /// Returns all attached details.
    #[must_use]
    pub fn details(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.details
    }
}

/// Registration and composition errors.
///
/// These are startup problems. They surface from registry builder calls and
/// from freezing the registry; if one slips through to dispatch time it is
/// fatal for that request type and not worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ConfigurationError {
    /// A second handler was registered for one request type.
    #[error("a handler is already registered for request type {request}")]
    DuplicateHandler {
        /// Fully-qualified request type name.
        request: &'static str,
    },

    /// The request type was never registered.
    #[error("request type {request} is not registered with this sender")]
    NotRegistered {
        /// Fully-qualified request type name.
        request: &'static str,
    },

    /// Strict freeze found request types without a handler.
    #[error("no handler registered for request types: {}", requests.join(", "))]
    MissingHandlers {
        /// Fully-qualified names of the offending request types.
        requests: Vec<&'static str>,
    },

    /// The resolver could not produce an instance.
    #[error("failed to resolve {type_name}: {reason}")]
    Resolution {
        /// The type that could not be resolved.
        type_name: &'static str,
        /// Why resolution failed.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a resolution error for a type that is not registered.
    #[must_use]
    pub fn not_resolvable<T>() -> Self {
        Self::Resolution {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }
}

/// Exceptional dispatch outcomes.
///
/// Anything that is not a [`Response`](crate::Response) ends up here.
#[derive(Debug, ThisError)]
pub enum DispatchError {
    /// The sender or registry is misconfigured for this request type.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The call's cancellation token fired before work could start.
    #[error("request was canceled")]
    Canceled,

    /// A pipe or handler raised an unexpected fault.
    #[error("unhandled fault: {0}")]
    Fault(#[from] anyhow::Error),
}

impl DispatchError {
    /// Wraps an arbitrary error as a fault.
    pub fn fault(err: impl Into<anyhow::Error>) -> Self {
        Self::Fault(err.into())
    }

    /// Returns `true` if this is the cancellation outcome.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns `true` if this is a configuration failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_defaults_have_stable_codes() {
        assert_eq!(Error::bad_request("x").code(), "generic.bad_request");
        assert_eq!(Error::validation("x").category(), ErrorCategory::Validation);
        assert_eq!(
            Error::internal_server_error().category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::not_found("missing user");
        assert_eq!(err.to_string(), "generic.not_found: missing user");
    }

    #[test]
    fn test_error_details() {
        let err = Error::conflict("version mismatch")
            .with_detail("expected", 3)
            .with_detail("actual", "4");
        assert_eq!(err.detail("expected"), Some(&serde_json::json!(3)));
        assert_eq!(err.details().len(), 2);
        assert!(err.detail("missing").is_none());
    }

    #[test]
    fn test_error_serialization() {
        let err = Error::timeout("upstream slow");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["category"], "timeout");
        assert_eq!(json["code"], "generic.timeout");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_transient_categories() {
        assert!(ErrorCategory::Timeout.is_transient());
        assert!(ErrorCategory::Unavailable.is_transient());
        assert!(!ErrorCategory::Validation.is_transient());
        assert!(!ErrorCategory::Internal.is_transient());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingHandlers {
            requests: vec!["Ping", "Other"],
        };
        assert_eq!(
            err.to_string(),
            "no handler registered for request types: Ping, Other"
        );
    }

    #[test]
    fn test_dispatch_error_predicates() {
        assert!(DispatchError::Canceled.is_canceled());
        let cfg: DispatchError = ConfigurationError::NotRegistered { request: "Ping" }.into();
        assert!(cfg.is_configuration());
        assert!(!cfg.is_canceled());

        let fault = DispatchError::fault(std::io::Error::other("disk gone"));
        assert!(fault.to_string().contains("disk gone"));
    }
}
