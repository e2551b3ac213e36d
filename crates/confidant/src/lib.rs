//! Confidant runtime: caching, sessions, admission control, failure
//! isolation and background maintenance for the companion service.
//!
//! [`Runtime`] builds every component from a [`ConfidantConfig`] and keeps
//! them together so request handlers and background jobs share one set of
//! state:
//!
//! ```rust,ignore
//! let loaded = confidant::load_config(None)?;
//! let _guard = confidant::telemetry::init(&loaded.config.logging_or_default())?;
//!
//! let runtime = Runtime::new(loaded.config)?;
//! runtime.start()?;
//!
//! if !runtime.rate_limiter().admit(&client_addr) {
//!     return Err(TooManyRequests);
//! }
//! let reply = runtime
//!     .breaker("llm")
//!     .call(|| provider.complete(&prompt))
//!     .await;
//!
//! runtime.shutdown().await?;
//! ```

pub mod error;
pub mod monitor;
pub mod runtime;
pub mod telemetry;

pub use error::{Result, RuntimeError};
pub use monitor::{MonitorStats, PerformanceMonitor};
pub use runtime::{Runtime, RuntimeStatus};

pub use confidant_cache::{Cache, CacheConfig, CacheError, CacheStats, ExpiringStore, Fingerprint};
pub use confidant_config::{ConfidantConfig, ConfigError, LoadedConfig, load_config};
pub use confidant_resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics,
    CircuitState, RateLimitConfig, RateLimiter,
};
pub use confidant_scheduler::{SchedulerConfig, SchedulerError, TaskScheduler, TaskStatus};
pub use confidant_session::{Session, SessionConfig, SessionError, SessionManager, SessionStats};
