//! Assembles every component from configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use confidant_cache::{Cache, CacheConfig, CacheStats};
use confidant_config::ConfidantConfig;
use confidant_resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, RateLimitConfig, RateLimiter,
};
use confidant_scheduler::{SchedulerConfig, TaskScheduler, TaskStatus};
use confidant_session::{SessionConfig, SessionManager, SessionStats};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::monitor::{MonitorStats, PerformanceMonitor};

/// Name of the task that sweeps expired sessions.
pub const SESSION_CLEANUP_TASK: &str = "session_cleanup";

/// Name of the task that drops expired cache entries.
pub const CACHE_COMPACTION_TASK: &str = "cache_compaction";

/// Name of the task that forgets idle rate-limit clients.
pub const RATE_LIMIT_COMPACTION_TASK: &str = "rate_limit_compaction";

/// The shared in-process state of the service.
///
/// Components are created once and handed out by reference; clones of the
/// cache and session manager share storage with the runtime.
pub struct Runtime {
    config: ConfidantConfig,
    cache: Cache<Value>,
    sessions: SessionManager,
    rate_limiter: Arc<RateLimiter>,
    breaker_config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    scheduler: TaskScheduler,
    monitor: PerformanceMonitor,
    maintenance_registered: AtomicBool,
}

impl Runtime {
    /// Validate `config` and build every component. Nothing runs in the
    /// background until [`start`](Self::start).
    pub fn new(config: ConfidantConfig) -> Result<Self> {
        config.validate()?;

        let cache_section = config.cache_or_default();
        let cache = Cache::new(
            CacheConfig::new()
                .with_default_ttl(cache_section.default_ttl())
                .with_key_prefix(cache_section.key_prefix.clone()),
        );

        let sessions = SessionManager::new(
            SessionConfig::new().with_default_ttl(config.session_or_default().ttl()),
        );

        let rate_limit = config.rate_limit_or_default();
        let rate_limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::new(rate_limit.max_requests, rate_limit.window())
                .with_compaction_interval(rate_limit.compaction_interval()),
        ));

        let breaker = config.circuit_breaker_or_default();
        let breaker_config = CircuitBreakerConfig::new(breaker.failure_threshold, breaker.open_timeout());

        let scheduler_section = config.scheduler_or_default();
        let scheduler = TaskScheduler::new(
            SchedulerConfig::new()
                .with_tick(scheduler_section.tick())
                .with_stop_timeout(scheduler_section.stop_timeout()),
        );

        Ok(Self {
            config,
            cache,
            sessions,
            rate_limiter,
            breaker_config,
            breakers: Mutex::new(HashMap::new()),
            scheduler,
            monitor: PerformanceMonitor::new(),
            maintenance_registered: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ConfidantConfig {
        &self.config
    }

    /// Cache for generated replies and other JSON-serializable results.
    pub fn cache(&self) -> &Cache<Value> {
        &self.cache
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// The breaker guarding the external provider `name`, created on first
    /// use with the configured threshold and timeout.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        if let Some(breaker) = breakers.get(name) {
            return Arc::clone(breaker);
        }

        debug!(breaker = %name, "Creating circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(name, self.breaker_config.clone()));
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Metrics for every breaker created so far, sorted by name.
    pub fn breaker_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        let mut metrics: Vec<_> = self
            .breakers
            .lock()
            .values()
            .map(|breaker| breaker.snapshot())
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }

    /// Register the maintenance tasks (unless disabled in config) and start
    /// the scheduler loop. Calling it again restarts a stopped loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.config.scheduler_or_default().maintenance_tasks
            && !self.maintenance_registered.swap(true, Ordering::SeqCst)
        {
            self.register_maintenance_tasks()?;
        }

        self.scheduler.start();
        info!("Confidant runtime started");
        Ok(())
    }

    /// Stop the scheduler, waiting for a running task up to the configured
    /// stop timeout.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.stop().await?;
        info!("Confidant runtime stopped");
        Ok(())
    }

    /// Snapshot of every component for the health endpoint.
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            cache: self.cache.stats(),
            sessions: self.sessions.stats(),
            rate_limited_clients: self.rate_limiter.tracked_identifiers(),
            breakers: self.breaker_metrics(),
            tasks: self.scheduler.list_tasks(),
            monitor: self.monitor.stats(),
        }
    }

    fn register_maintenance_tasks(&self) -> Result<()> {
        let sessions = self.sessions.clone();
        self.scheduler.add_periodic_task(
            SESSION_CLEANUP_TASK,
            self.config.session_or_default().cleanup_interval(),
            move || {
                let sessions = sessions.clone();
                async move {
                    let removed = sessions.cleanup_expired();
                    debug!(removed, "Session cleanup finished");
                    anyhow::Ok(())
                }
            },
        )?;

        let cache = self.cache.clone();
        self.scheduler.add_periodic_task(
            CACHE_COMPACTION_TASK,
            self.config.cache_or_default().purge_interval(),
            move || {
                let cache = cache.clone();
                async move {
                    let removed = cache.purge_expired();
                    debug!(removed, "Cache compaction finished");
                    anyhow::Ok(())
                }
            },
        )?;

        let rate_limiter = Arc::clone(&self.rate_limiter);
        self.scheduler.add_periodic_task(
            RATE_LIMIT_COMPACTION_TASK,
            self.config.rate_limit_or_default().compaction_interval(),
            move || {
                let rate_limiter = Arc::clone(&rate_limiter);
                async move {
                    let removed = rate_limiter.compact();
                    debug!(removed, "Rate limit compaction finished");
                    anyhow::Ok(())
                }
            },
        )?;

        Ok(())
    }
}

/// Combined component statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub cache: CacheStats,
    pub sessions: SessionStats,
    /// Clients currently holding a rate-limit window.
    pub rate_limited_clients: usize,
    pub breakers: Vec<CircuitBreakerMetrics>,
    pub tasks: Vec<TaskStatus>,
    pub monitor: MonitorStats,
}
