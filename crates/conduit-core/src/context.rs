//! Request context types.
//!
//! The [`RequestContext`] wraps one request plus per-call ambient state and
//! flows through every pipe into the handler.

use crate::request::Request;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each dispatch, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for log correlation.
///
/// # Example
///
/// ```
/// use conduit_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// Useful when an upstream caller already assigned a correlation ID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Opaque key-value bag carried by a [`RequestContext`].
///
/// The bag is writable through a shared reference so that a pipe can leave
/// data for later pipes and the handler while the context itself stays
/// read-only. Values are JSON values; the host decides what goes in.
///
/// # Example
///
/// ```
/// use conduit_core::Metadata;
///
/// let metadata = Metadata::new();
/// metadata.insert("tenant", "acme");
/// metadata.insert("attempt", 2);
///
/// assert_eq!(metadata.get_as::<String>("tenant").as_deref(), Some("acme"));
/// assert_eq!(metadata.get_as::<u32>("attempt"), Some(2));
/// ```
#[derive(Default)]
pub struct Metadata {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl Metadata {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one for this key.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.entries.write().insert(key.into(), value.into())
    }

    /// Returns a copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the value under `key` deserialized into `T`.
    ///
    /// Returns `None` if the key is absent or the value has another shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.write().remove(key)
    }

    /// Checks whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a point-in-time copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.entries.read().clone()
    }
}

impl Clone for Metadata {
    fn clone(&self) -> Self {
        Self {
            entries: RwLock::new(self.snapshot()),
        }
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.read().iter()).finish()
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

/// Per-call wrapper around a request plus ambient metadata.
///
/// A fresh context is created for every dispatch. Pipes and the handler see
/// it through a shared reference; only the [`Metadata`] bag is mutable.
///
/// # Example
///
/// ```
/// use conduit_core::{Request, RequestContext};
///
/// struct Ping { message: String }
/// impl Request for Ping { type Response = String; }
///
/// let ctx = RequestContext::new(Ping { message: "hi".into() });
/// assert_eq!(ctx.request().message, "hi");
/// assert_eq!(ctx.request_type(), "Ping");
/// ```
pub struct RequestContext<R> {
    request: R,
    request_id: RequestId,
    metadata: Metadata,
    started_at: Instant,
}

impl<R: Request> RequestContext<R> {
    /// Creates a context with a fresh request ID and an empty metadata bag.
    #[must_use]
    pub fn new(request: R) -> Self {
        Self::with_metadata(request, Metadata::new())
    }

    /// Creates a context with pre-populated metadata.
    #[must_use]
    pub fn with_metadata(request: R, metadata: Metadata) -> Self {
        Self {
            request,
            request_id: RequestId::new(),
            metadata,
            started_at: Instant::now(),
        }
    }

    /// Replaces the generated request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the wrapped request.
    #[must_use]
    pub const fn request(&self) -> &R {
        &self.request
    }

    /// Consumes the context, returning the request.
    #[must_use]
    pub fn into_request(self) -> R {
        self.request
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the short request type name.
    #[must_use]
    pub fn request_type(&self) -> &'static str {
        R::type_name()
    }

    /// Returns the metadata bag.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl<R> fmt::Debug for RequestContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_type", &std::any::type_name::<R>())
            .field("request_id", &self.request_id)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a [`RequestContext`].
///
/// Pipes that apply to every request type cannot name `R`; they see the
/// context through this trait instead.
pub trait Context: Send + Sync {
    /// Returns the short request type name.
    fn request_type(&self) -> &'static str;

    /// Returns the request ID.
    fn request_id(&self) -> RequestId;

    /// Returns the metadata bag.
    fn metadata(&self) -> &Metadata;

    /// Returns the request for downcasting.
    fn request_any(&self) -> &dyn Any;

    /// Returns the elapsed time since the context was created.
    fn elapsed(&self) -> std::time::Duration;
}

impl<R: Request> Context for RequestContext<R> {
    fn request_type(&self) -> &'static str {
        R::type_name()
    }

    fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn request_any(&self) -> &dyn Any {
        &self.request
    }

    fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
