//! Bootstrap integration tests.
//!
//! Configuration loaded from TOML drives the built-in pipes, strict freeze
//! and eager composition of a bootstrapped [`Conduit`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conduit::prelude::*;

struct Charge {
    cents: u64,
}

impl Request for Charge {
    type Response = u64;
}

struct Refund;

impl Request for Refund {
    type Response = ();
}

/// Fails with `unavailable` until its `failures` budget is spent.
struct FlakyGateway {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl Handler<Charge> for FlakyGateway {
    async fn handle(
        &self,
        ctx: &RequestContext<Charge>,
        _cancel: &CancellationToken,
    ) -> PipeResult<u64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Ok(Response::failure(Error::unavailable("gateway busy")));
        }
        Ok(Response::success(ctx.request().cents))
    }
}

struct SlowGateway;

impl Handler<Charge> for SlowGateway {
    async fn handle(
        &self,
        ctx: &RequestContext<Charge>,
        _cancel: &CancellationToken,
    ) -> PipeResult<u64> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Response::success(ctx.request().cents))
    }
}

fn load(toml: &str) -> ConduitConfig {
    ConfigLoader::new()
        .with_defaults()
        .with_string(toml, "toml")
        .unwrap()
        .load()
        .unwrap()
}

fn flaky(calls: &Arc<AtomicUsize>, failures: usize) -> RegistryBuilder {
    let calls = Arc::clone(calls);
    RegistryBuilder::new()
        .handler::<Charge, _>(move || FlakyGateway {
            calls: Arc::clone(&calls),
            failures,
        })
        .unwrap()
}

#[tokio::test]
async fn test_retry_from_config_recovers() {
    let config = load(
        r#"
        [dispatch.retry]
        enabled = true
        max_attempts = 3
        backoff_ms = 0
        "#,
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let conduit = Conduit::builder()
        .config(config)
        .registry(flaky(&calls, 2))
        .build()
        .unwrap();

    let response = conduit
        .send(Charge { cents: 500 }, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.into_value(), Some(500));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_disabled_by_default() {
    let calls = Arc::new(AtomicUsize::new(0));

    let conduit = Conduit::builder()
        .registry(flaky(&calls, 1))
        .build()
        .unwrap();

    let error = conduit
        .send(Charge { cents: 500 }, &CancellationToken::new())
        .await
        .unwrap()
        .into_error()
        .unwrap();

    assert_eq!(error.category(), ErrorCategory::Unavailable);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_from_config() {
    let config = load(
        r#"
        [dispatch]
        default_timeout_ms = 100
        "#,
    );

    let conduit = Conduit::builder()
        .config(config)
        .registry(
            RegistryBuilder::new()
                .handler::<Charge, _>(|| SlowGateway)
                .unwrap(),
        )
        .build()
        .unwrap();

    let error = conduit
        .send(Charge { cents: 1 }, &CancellationToken::new())
        .await
        .unwrap()
        .into_error()
        .unwrap();

    assert_eq!(error.category(), ErrorCategory::Timeout);
    assert_eq!(
        error.detail("timeout_ms").and_then(|value| value.as_u64()),
        Some(100)
    );
}

#[test]
fn test_strict_handlers_from_config() {
    let config = load(
        r#"
        [dispatch]
        strict_handlers = true
        "#,
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let err = Conduit::builder()
        .config(config)
        .registry(flaky(&calls, 0).request::<Refund>())
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::Configuration(ConfigurationError::MissingHandlers { .. })
    ));
}

#[tokio::test]
async fn test_enricher_and_resolver() {
    struct Fee(u64);

    let mut container = Container::new();
    container.register(Arc::new(Fee(25)));

    let registry = RegistryBuilder::new()
        .handler_with::<Charge, _>(|resolver| {
            let fee = resolver.resolve_required::<Fee>()?;
            Ok(FnHandler::new(move |ctx: &RequestContext<Charge>| {
                let surcharge: u64 = ctx.metadata().get_as("surcharge").unwrap_or(0);
                Response::success(ctx.request().cents + fee.0 + surcharge)
            }))
        })
        .unwrap();

    let conduit = Conduit::builder()
        .registry(registry)
        .resolver(container)
        .enricher(|_request_type: &'static str, metadata: &Metadata| {
            metadata.insert("surcharge", 5);
        })
        .build()
        .unwrap();

    let response = conduit
        .send(Charge { cents: 100 }, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.into_value(), Some(130));
}
