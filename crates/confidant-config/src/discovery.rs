//! Config file discovery, loading and saving.
//!
//! Resolution order:
//! 1. An explicit path passed by the caller
//! 2. The `CONFIDANT_CONFIG` environment variable
//! 3. `./confidant.toml`
//!
//! When no file is found the defaults are used.

use std::path::{Path, PathBuf};

use crate::{ConfidantConfig, ConfigError, Result};

/// Default config filename, looked up in the working directory.
const PROJECT_CONFIG_FILE: &str = "confidant.toml";

/// Environment variable naming a config file.
const CONFIG_PATH_ENV: &str = "CONFIDANT_CONFIG";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The validated configuration.
    pub config: ConfidantConfig,
    /// File the configuration came from, if any.
    pub source: Option<PathBuf>,
}

/// Load and validate configuration.
///
/// An explicit `path` that does not exist is an error; a discovered path
/// that does not exist falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = path {
        return load_validated(path);
    }

    let candidate = match std::env::var(CONFIG_PATH_ENV) {
        Ok(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(PROJECT_CONFIG_FILE),
    };

    if candidate.is_file() {
        load_validated(&candidate)
    } else {
        Ok(LoadedConfig {
            config: ConfidantConfig::default(),
            source: None,
        })
    }
}

/// Load config from a specific file path (no discovery, no validation).
pub fn load_config_file(path: &Path) -> Result<ConfidantConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ConfidantConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &ConfidantConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

fn load_validated(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    config.validate()?;
    Ok(LoadedConfig {
        config,
        source: Some(path.to_path_buf()),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("confidant.toml");
        fs::write(
            &path,
            r#"
[session]
ttl_secs = 900
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.session_or_default().ttl_secs, 900);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/confidant.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("confidant.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[cache]\nkey_prefix = \"api:\"\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.cache_or_default().key_prefix, "api:");
    }

    #[test]
    fn test_load_config_explicit_path_missing() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("confidant.toml");
        fs::write(&path, "[session]\nttl_secs = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("confidant.toml");

        let mut config = ConfidantConfig::new();
        config.rate_limit = Some(crate::RateLimitSection {
            max_requests: 20,
            ..Default::default()
        });
        save_config(&config, &path).unwrap();

        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
