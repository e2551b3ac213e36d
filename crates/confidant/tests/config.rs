//! Loading a runtime from a config file on disk.

use std::fs;
use std::time::Duration;

use confidant::{ConfigError, Runtime, RuntimeError, load_config};
use tempfile::TempDir;

#[test]
fn test_runtime_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("confidant.toml");
    fs::write(
        &path,
        r#"
[cache]
key_prefix = "confidant:"

[rate_limit]
max_requests = 30
window_secs = 60

[scheduler]
tick_millis = 250
stop_timeout_secs = 2
"#,
    )
    .unwrap();

    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));

    let runtime = Runtime::new(loaded.config).unwrap();
    assert_eq!(runtime.rate_limiter().config().max_requests, 30);
    assert_eq!(runtime.scheduler().config().tick, Duration::from_millis(250));
    assert_eq!(runtime.scheduler().config().stop_timeout, Duration::from_secs(2));

    let key = runtime.cache().fingerprint("reply").build().unwrap();
    assert!(key.as_str().starts_with("confidant:reply:"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("confidant.toml");
    fs::write(&path, "[circuit_breaker]\nfailure_threshold = 0\n").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));

    let config = confidant_config::load_config_file(&path).unwrap();
    assert!(matches!(
        Runtime::new(config),
        Err(RuntimeError::Config(ConfigError::Invalid { .. }))
    ));
}
