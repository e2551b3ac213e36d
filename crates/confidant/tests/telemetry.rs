//! Subscriber installation. Kept in its own test binary because the global
//! subscriber can only be set once per process.

use std::fs;

use confidant::telemetry;
use confidant_config::LoggingSection;
use tempfile::TempDir;

#[test]
fn test_init_writes_json_log_file() {
    let dir = TempDir::new().unwrap();
    let config = LoggingSection {
        log_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let guard = telemetry::init(&config).unwrap();
    assert!(guard.is_some());
    tracing::info!(component = "telemetry-test", "Subscriber installed");
    drop(guard);

    let files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(files.iter().any(|name| name.starts_with("confidant.log")));

    assert!(telemetry::init(&LoggingSection::default()).is_err());
}
