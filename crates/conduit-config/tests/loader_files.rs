//! Layered loading from files and the environment.

use std::io::Write;

use conduit_config::{ConfigError, ConfigLoader, LogFormat};
use tempfile::{Builder, NamedTempFile};

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_toml_file() {
    let file = temp_file(
        ".toml",
        r#"
            [dispatch]
            eager_composition = true
            default_timeout_ms = 2000

            [dispatch.retry]
            enabled = true
            backoff_ms = 10

            [telemetry]
            service_name = "orders"

            [telemetry.logging]
            format = "pretty"
        "#,
    );

    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .load()
        .unwrap();

    assert!(config.dispatch.eager_composition);
    assert_eq!(config.dispatch.default_timeout_ms, Some(2000));
    assert!(config.dispatch.retry.enabled);
    assert_eq!(config.dispatch.retry.backoff_ms, 10);
    assert_eq!(config.dispatch.retry.max_attempts, 3);
    assert_eq!(config.telemetry.service_name, "orders");
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
}

#[test]
fn loads_json_file() {
    let file = temp_file(
        ".json",
        r#"{ "dispatch": { "strict_handlers": true }, "telemetry": { "environment": "staging" } }"#,
    );

    let config = ConfigLoader::new()
        .with_optional_file(file.path())
        .unwrap()
        .load()
        .unwrap();

    assert!(config.dispatch.strict_handlers);
    assert_eq!(config.telemetry.environment, "staging");
}

#[test]
fn rejects_unknown_fields_in_file() {
    let file = temp_file(
        ".toml",
        r#"
            [dispatch]
            parallel = true
        "#,
    );

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn rejects_unsupported_extension() {
    let file = temp_file(".yaml", "dispatch: {}");

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn dotenv_file_feeds_env_overrides() {
    let file = temp_file(
        ".env",
        "CONDUIT_DOTENV_TEST__DISPATCH__RETRY__MAX_ATTEMPTS=7\n",
    );

    let config = ConfigLoader::new()
        .with_dotenv_file(file.path())
        .unwrap()
        .with_env_prefix("conduit_dotenv_test")
        .load()
        .unwrap();

    assert_eq!(config.dispatch.retry.max_attempts, 7);
}

#[test]
fn env_overrides_file_values() {
    let file = temp_file(
        ".toml",
        r#"
            [dispatch]
            default_timeout_ms = 2000

            [telemetry.logging]
            level = "warn"
        "#,
    );

    std::env::set_var("CONDUIT_ENV_TEST__DISPATCH__DEFAULT_TIMEOUT_MS", "none");
    std::env::set_var("CONDUIT_ENV_TEST__TELEMETRY__LOGGING__LEVEL", "debug");

    let config = ConfigLoader::new()
        .with_file(file.path())
        .unwrap()
        .with_env_prefix("CONDUIT_ENV_TEST")
        .load()
        .unwrap();

    assert!(config.dispatch.default_timeout_ms.is_none());
    assert_eq!(config.telemetry.logging.level, "debug");
}

#[test]
fn invalid_env_value_is_reported() {
    std::env::set_var("CONDUIT_BAD_ENV_TEST__DISPATCH__STRICT_HANDLERS", "perhaps");

    let result = ConfigLoader::new()
        .with_env_prefix("CONDUIT_BAD_ENV_TEST")
        .load();

    assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
}
