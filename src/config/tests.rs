use super::*;
use serial_test::serial;

fn clear_forge_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("FORGE_") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn load_applies_defaults() {
    clear_forge_env();

    let config = Config::load().unwrap();
    assert_eq!(config.api.port, 8081);
    assert_eq!(config.executor.max_concurrent, 10);
    assert_eq!(config.executor.default_timeout_secs, 300);
    assert_eq!(config.sandbox.default_memory_mb, 256);
    assert_eq!(config.sandbox.base_image, "alpine:latest");
    assert!(config.completion.api_key.is_none());
    assert_eq!(config.validation.base_url, "http://127.0.0.1:8082");
}

#[test]
#[serial]
fn load_reads_environment_overrides() {
    clear_forge_env();
    std::env::set_var("FORGE_API_PORT", "9090");
    std::env::set_var("FORGE_MAX_CONCURRENT", "3");
    std::env::set_var("FORGE_SANDBOX_BASE_IMAGE", "debian:bookworm-slim");
    std::env::set_var("FORGE_COMPLETION_API_KEY", "sk-test-key");

    let config = Config::load().unwrap();
    assert_eq!(config.api.port, 9090);
    assert_eq!(config.executor.max_concurrent, 3);
    assert_eq!(config.sandbox.base_image, "debian:bookworm-slim");
    assert_eq!(config.completion.api_key.as_deref(), Some("sk-test-key"));

    clear_forge_env();
}

#[test]
#[serial]
fn load_rejects_zero_concurrency() {
    clear_forge_env();
    std::env::set_var("FORGE_MAX_CONCURRENT", "0");

    let result = Config::load();
    assert!(result.is_err());

    clear_forge_env();
}

#[test]
#[serial]
fn load_rejects_default_timeout_above_cap() {
    clear_forge_env();
    std::env::set_var("FORGE_DEFAULT_TIMEOUT_SECS", "900");
    std::env::set_var("FORGE_MAX_TIMEOUT_SECS", "600");

    let result = Config::load();
    assert!(result.is_err());

    clear_forge_env();
}

#[test]
#[serial]
fn blank_api_key_is_treated_as_absent() {
    clear_forge_env();
    std::env::set_var("FORGE_COMPLETION_API_KEY", "   ");

    let config = Config::load().unwrap();
    assert!(config.completion.api_key.is_none());

    clear_forge_env();
}

#[test]
#[serial]
fn unparseable_numbers_fall_back_to_defaults() {
    clear_forge_env();
    std::env::set_var("FORGE_API_PORT", "not-a-port");

    let config = Config::load().unwrap();
    assert_eq!(config.api.port, 8081);

    clear_forge_env();
}
