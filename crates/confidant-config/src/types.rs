//! Configuration types mapping to the TOML schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs can be loaded and
/// merged. Use the `*_or_default` accessors to read a section with its
/// defaults filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidantConfig {
    /// Response cache.
    pub cache: Option<CacheSection>,

    /// Conversation sessions.
    pub session: Option<SessionSection>,

    /// Per-client rate limiting.
    pub rate_limit: Option<RateLimitSection>,

    /// Circuit breakers guarding external providers.
    pub circuit_breaker: Option<CircuitBreakerSection>,

    /// Background task scheduler.
    pub scheduler: Option<SchedulerSection>,

    /// Log output.
    pub logging: Option<LoggingSection>,
}

impl ConfidantConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: ConfidantConfig) {
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.rate_limit.is_some() {
            self.rate_limit = other.rate_limit;
        }
        if other.circuit_breaker.is_some() {
            self.circuit_breaker = other.circuit_breaker;
        }
        if other.scheduler.is_some() {
            self.scheduler = other.scheduler;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        let cache = self.cache_or_default();
        require_nonzero("cache.default_ttl_secs", cache.default_ttl_secs)?;
        require_nonzero("cache.purge_interval_secs", cache.purge_interval_secs)?;

        let session = self.session_or_default();
        require_nonzero("session.ttl_secs", session.ttl_secs)?;
        require_nonzero("session.cleanup_interval_secs", session.cleanup_interval_secs)?;

        let rate_limit = self.rate_limit_or_default();
        require_nonzero("rate_limit.window_secs", rate_limit.window_secs)?;
        if let Some(interval) = rate_limit.compaction_interval_secs {
            require_nonzero("rate_limit.compaction_interval_secs", interval)?;
        }

        let breaker = self.circuit_breaker_or_default();
        require_nonzero(
            "circuit_breaker.failure_threshold",
            u64::from(breaker.failure_threshold),
        )?;

        let scheduler = self.scheduler_or_default();
        require_nonzero("scheduler.tick_millis", scheduler.tick_millis)?;

        let logging = self.logging_or_default();
        if logging.filter.trim().is_empty() {
            return Err(ConfigError::invalid("logging.filter", "must not be empty"));
        }

        Ok(())
    }

    pub fn cache_or_default(&self) -> CacheSection {
        self.cache.clone().unwrap_or_default()
    }

    pub fn session_or_default(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    pub fn rate_limit_or_default(&self) -> RateLimitSection {
        self.rate_limit.clone().unwrap_or_default()
    }

    pub fn circuit_breaker_or_default(&self) -> CircuitBreakerSection {
        self.circuit_breaker.clone().unwrap_or_default()
    }

    pub fn scheduler_or_default(&self) -> SchedulerSection {
        self.scheduler.clone().unwrap_or_default()
    }

    pub fn logging_or_default(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }
}

fn require_nonzero(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// TTL applied when a caller does not give one.
    pub default_ttl_secs: u64,
    /// Prepended to every fingerprint.
    pub key_prefix: String,
    /// How often the scheduler drops expired entries.
    pub purge_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            key_prefix: String::new(),
            purge_interval_secs: 600,
        }
    }
}

impl CacheSection {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Inactivity period after which a session expires.
    pub ttl_secs: u64,
    /// How often expired sessions are swept.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

impl SessionSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Requests admitted per client within one window. Zero rejects all.
    pub max_requests: usize,
    /// Window length.
    pub window_secs: u64,
    /// How often idle clients are forgotten. Defaults to the window length.
    pub compaction_interval_secs: Option<u64>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            compaction_interval_secs: None,
        }
    }
}

impl RateLimitSection {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn compaction_interval(&self) -> Duration {
        Duration::from_secs(self.compaction_interval_secs.unwrap_or(self.window_secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Circuit Breaker Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Circuit breaker configuration, shared by every named breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before allowing a trial.
    pub open_timeout_secs: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 60,
        }
    }
}

impl CircuitBreakerSection {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Task scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Time between evaluations of the task list.
    pub tick_millis: u64,
    /// How long shutdown waits for a running task.
    pub stop_timeout_secs: u64,
    /// Register the built-in maintenance tasks on start.
    pub maintenance_tasks: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_millis: 1000,
            stop_timeout_secs: 5,
            maintenance_tasks: true,
        }
    }
}

impl SchedulerSection {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Directory for daily-rolling JSON log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
    /// File name prefix for the JSON logs.
    pub file_prefix: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_dir: None,
            file_prefix: "confidant.log".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
