//! Unit tests for configuration loading and graceful degradation
//!
//! Tests that manipulate MENUBOARD_STORAGE_DIR are marked with #[serial]
//! so they run sequentially, not in parallel.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use menuboard_common::config::{
    resolve_storage_dir, PushMethod, RemoteSettings, TomlConfig, DEFAULT_CHANNEL_NAME,
    DEFAULT_STORAGE_KEY, ENV_STORAGE_DIR, MIN_POLL_INTERVAL_MS,
};
use serial_test::serial;

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    assert_eq!(config.channel_name, DEFAULT_CHANNEL_NAME);
    assert_eq!(config.logging.level, "info");
    assert!(config.remote_settings().is_none(), "no endpoint, no remote");
}

#[test]
fn test_full_toml_parses() {
    let config = TomlConfig::from_toml_str(
        r#"
        storage_dir = "/var/lib/menuboard"
        storage_key = "boards"

        [remote]
        endpoint = "https://example.com/exec"
        token = "secret"
        timeout_ms = 2000
        poll_interval_ms = 30000
        get_action = "load"
        set_action = "store"
        method = "put"

        [remote.headers]
        X-Client = "kiosk"

        [display]
        display_key = "k-123"
        base_url = "https://boards.example.com/index.html"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.storage_dir, Some(PathBuf::from("/var/lib/menuboard")));
    assert_eq!(config.storage_key, "boards");
    assert_eq!(config.display.display_key.as_deref(), Some("k-123"));
    assert_eq!(config.logging.level, "debug");

    let remote = config.remote_settings().unwrap();
    assert_eq!(remote.endpoint, "https://example.com/exec");
    assert_eq!(remote.token.as_deref(), Some("secret"));
    assert_eq!(remote.timeout, Duration::from_millis(2000));
    assert_eq!(remote.poll_interval, Duration::from_millis(30_000));
    assert_eq!(remote.get_action, "load");
    assert_eq!(remote.set_action, "store");
    assert_eq!(remote.method, PushMethod::Put);
    assert_eq!(remote.headers.get("X-Client").map(String::as_str), Some("kiosk"));
}

#[test]
fn test_remote_settings_clamping() {
    let config = TomlConfig::from_toml_str(
        r#"
        [remote]
        endpoint = " https://example.com/exec "
        token = "  "
        timeout_ms = 0
        poll_interval_ms = 100
        method = "PATCH"
        "#,
    )
    .unwrap();

    let remote = config.remote_settings().unwrap();
    assert_eq!(remote.endpoint, "https://example.com/exec");
    assert_eq!(remote.token, None, "blank token is not sent");
    assert_eq!(remote.timeout, Duration::from_millis(15_000));
    assert_eq!(remote.poll_interval, Duration::from_millis(MIN_POLL_INTERVAL_MS));
    assert_eq!(remote.method, PushMethod::Post);
}

#[test]
fn test_builder_poll_interval_clamped() {
    let settings = RemoteSettings::new("http://localhost").with_poll_interval(Duration::from_millis(10));
    assert_eq!(settings.poll_interval, Duration::from_millis(MIN_POLL_INTERVAL_MS));
}

#[test]
fn test_invalid_toml_is_error() {
    let result = TomlConfig::from_toml_str("storage_key = [");
    assert!(result.is_err());
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
}

#[test]
fn test_existing_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "storage_key = \"from-file\"\n").unwrap();
    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.storage_key, "from-file");
}

#[test]
#[serial]
fn test_storage_dir_cli_has_priority() {
    env::set_var(ENV_STORAGE_DIR, "/tmp/menuboard-env");
    let config = TomlConfig {
        storage_dir: Some(PathBuf::from("/tmp/menuboard-toml")),
        ..Default::default()
    };
    let dir = resolve_storage_dir(Some(Path::new("/tmp/menuboard-cli")), &config);
    assert_eq!(dir, PathBuf::from("/tmp/menuboard-cli"));
    env::remove_var(ENV_STORAGE_DIR);
}

#[test]
#[serial]
fn test_storage_dir_env_over_toml() {
    env::set_var(ENV_STORAGE_DIR, "/tmp/menuboard-env");
    let config = TomlConfig {
        storage_dir: Some(PathBuf::from("/tmp/menuboard-toml")),
        ..Default::default()
    };
    assert_eq!(resolve_storage_dir(None, &config), PathBuf::from("/tmp/menuboard-env"));
    env::remove_var(ENV_STORAGE_DIR);
}

#[test]
#[serial]
fn test_storage_dir_toml_then_default() {
    env::remove_var(ENV_STORAGE_DIR);
    let config = TomlConfig {
        storage_dir: Some(PathBuf::from("/tmp/menuboard-toml")),
        ..Default::default()
    };
    assert_eq!(resolve_storage_dir(None, &config), PathBuf::from("/tmp/menuboard-toml"));

    let fallback = resolve_storage_dir(None, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
}
