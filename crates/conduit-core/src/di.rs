//! Type-keyed resolution capability.
//!
//! The dispatcher never constructs handlers or pipes on its own; it asks a
//! [`Resolve`] implementation for instances by type. [`Container`] is the
//! bundled implementation, holding shared singletons and per-call factories.
//!
//! # Example
//!
//! ```rust
//! use conduit_core::di::{Container, ResolveExt};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Database {
//!     connection_string: "postgres://localhost/db".to_string(),
//! }));
//!
//! let db: Arc<Database> = container.resolve().unwrap();
//! assert_eq!(db.connection_string, "postgres://localhost/db");
//! ```

use crate::error::ConfigurationError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased service instance.
pub type AnyService = Arc<dyn Any + Send + Sync>;

type ServiceFactory = Arc<dyn Fn() -> AnyService + Send + Sync>;

/// Object-safe "resolve by type" capability.
///
/// Implementations return `None` when they do not know the type. Use
/// [`ResolveExt`] for the typed helpers.
pub trait Resolve: Send + Sync {
    /// Resolves an instance of the type identified by `type_id`.
    ///
    /// `type_name` is informational and only used for diagnostics.
    fn resolve_any(&self, type_id: TypeId, type_name: &'static str) -> Option<AnyService>;
}

/// Typed helpers over any [`Resolve`] implementation.
pub trait ResolveExt: Resolve {
    /// Resolves an instance of `T`, or `None` if it is not registered.
    fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve_any(TypeId::of::<T>(), std::any::type_name::<T>())
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Resolves an instance of `T` or returns a resolution error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Resolution`] if `T` is not registered.
    fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigurationError> {
        self.resolve::<T>()
            .ok_or_else(ConfigurationError::not_resolvable::<T>)
    }
}

impl<T: Resolve + ?Sized> ResolveExt for T {}

impl<T: Resolve + ?Sized> Resolve for Arc<T> {
    fn resolve_any(&self, type_id: TypeId, type_name: &'static str) -> Option<AnyService> {
        (**self).resolve_any(type_id, type_name)
    }
}

enum Registration {
    Instance(AnyService),
    Factory(ServiceFactory),
}

/// A dependency container keyed by type.
///
/// Services are registered once at startup. A service is either a shared
/// instance (every resolution returns the same `Arc`) or a factory that builds
/// a fresh instance on every resolution.
///
/// # Thread Safety
///
/// The container is `Send + Sync` and is read-only once handed to a sender.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Registration>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared instance. Replaces any earlier registration of `T`.
    ///
    /// ```rust
    /// use conduit_core::di::{Container, ResolveExt};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    ///
    /// let mut container = Container::new();
    /// container.register(Arc::new(Clock));
    ///
    /// let a = container.resolve::<Clock>().unwrap();
    /// let b = container.resolve::<Clock>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services
            .insert(TypeId::of::<T>(), Registration::Instance(service));
    }

    /// Registers a factory that produces a new `T` on every resolution.
    ///
    /// ```rust
    /// use conduit_core::di::{Container, ResolveExt};
    /// use std::sync::Arc;
    ///
    /// struct Scratch(Vec<u8>);
    ///
    /// let mut container = Container::new();
    /// container.register_factory(|| Scratch(Vec::new()));
    ///
    /// let a = container.resolve::<Scratch>().unwrap();
    /// let b = container.resolve::<Scratch>().unwrap();
    /// assert!(!Arc::ptr_eq(&a, &b));
    /// ```
    pub fn register_factory<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: ServiceFactory = Arc::new(move || Arc::new(factory()) as AnyService);
        self.services
            .insert(TypeId::of::<T>(), Registration::Factory(factory));
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Resolve for Container {
    fn resolve_any(&self, type_id: TypeId, _type_name: &'static str) -> Option<AnyService> {
        match self.services.get(&type_id)? {
            Registration::Instance(service) => Some(Arc::clone(service)),
            Registration::Factory(factory) => Some(factory()),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self
            .services
            .values()
            .filter(|r| matches!(r, Registration::Factory(_)))
            .count();
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .field("factory_count", &factories)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    impl TestService {
        fn new(value: &str) -> Self {
            Self {
                value: value.to_string(),
            }
        }
    }

    #[test]
    fn test_container_new() {
        let container = Container::new();
        assert!(container.is_empty());
        assert_eq!(container.len(), 0);
    }

    #[test]
    fn test_container_register_and_resolve() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("hello")));

        let service: Option<Arc<TestService>> = container.resolve();
        assert_eq!(service.unwrap().value, "hello");
    }

    #[test]
    fn test_container_resolve_missing() {
        let container = Container::new();
        assert!(container.resolve::<TestService>().is_none());
    }

    #[test]
    fn test_container_resolve_required_missing() {
        let container = Container::new();
        let err = container.resolve_required::<TestService>().unwrap_err();
        assert!(err.to_string().contains("TestService"));
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_factory_builds_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        let mut container = Container::new();
        container.register_factory(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            TestService::new(&format!("instance-{n}"))
        });

        let a = container.resolve::<TestService>().unwrap();
        let b = container.resolve::<TestService>().unwrap();
        assert_eq!(a.value, "instance-0");
        assert_eq!(b.value, "instance-1");
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_register_replaces_earlier_registration() {
        let mut container = Container::new();
        container.register_factory(|| TestService::new("factory"));
        container.register(Arc::new(TestService::new("instance")));

        assert_eq!(container.len(), 1);
        assert_eq!(container.resolve::<TestService>().unwrap().value, "instance");
    }

    #[test]
    fn test_resolve_through_dyn_and_arc() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("shared")));

        let resolver: Arc<dyn Resolve> = Arc::new(container);
        assert!(resolver.resolve::<TestService>().is_some());
        assert!(resolver.resolve::<String>().is_none());
    }

    #[test]
    fn test_container_debug() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("debug")));
        container.register_factory(|| 5_u32);

        let debug = format!("{container:?}");
        assert!(debug.contains("service_count: 2"));
        assert!(debug.contains("factory_count: 1"));
    }
}
