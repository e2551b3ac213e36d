//! Sliding-window rate limiting keyed by client identifier.
//!
//! Every identifier keeps the timestamps of its admitted requests from the
//! trailing window. A request is admitted while fewer than `max_requests`
//! timestamps remain in that window. Rejected requests are not recorded.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per identifier within one window.
    pub max_requests: usize,
    /// Length of the trailing window.
    pub window: Duration,
    /// Minimum time between sweeps that drop idle identifiers.
    /// Defaults to the window length.
    pub compaction_interval: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            compaction_interval: None,
        }
    }
}

impl RateLimitConfig {
    /// Create a config admitting `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            compaction_interval: None,
        }
    }

    /// Set how often idle identifiers are swept.
    pub fn with_compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = Some(interval);
        self
    }

    fn compaction_interval(&self) -> Duration {
        self.compaction_interval.unwrap_or(self.window)
    }
}

struct LimiterState {
    windows: HashMap<String, VecDeque<Instant>>,
    last_compaction: Instant,
}

/// Per-identifier sliding-window rate limiter.
///
/// One lock covers the whole identifier map. Identifiers that stop sending
/// are dropped by a sweep that runs at most once per compaction interval,
/// piggybacking on whichever `admit` call comes along.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limiter
// ─────────────────────────────────────────────────────────────────────────────

impl RateLimiter {
    /// Create a rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState {
                windows: HashMap::new(),
                last_compaction: Instant::now(),
            }),
        }
    }

    /// Get the rate limit configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request from `identifier`.
    pub fn admit(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        if now.duration_since(state.last_compaction) >= self.config.compaction_interval() {
            let removed = sweep(&mut state.windows, now, self.config.window);
            state.last_compaction = now;
            if removed > 0 {
                debug!(removed, "Dropped idle rate limit windows");
            }
        }

        if self.config.max_requests == 0 {
            warn!(identifier = %identifier, "Rate limit exceeded");
            return false;
        }

        let window = state.windows.entry(identifier.to_string()).or_default();
        prune(window, now, self.config.window);

        if window.len() >= self.config.max_requests {
            warn!(
                identifier = %identifier,
                max_requests = self.config.max_requests,
                window_secs = self.config.window.as_secs(),
                "Rate limit exceeded"
            );
            return false;
        }

        window.push_back(now);
        true
    }

    /// Requests `identifier` may still make in the current window.
    pub fn remaining_quota(&self, identifier: &str) -> usize {
        let used = self.live_timestamps(identifier).len();
        self.config.max_requests.saturating_sub(used)
    }

    /// How long `identifier` must wait before its next request can be
    /// admitted, or `None` if it has quota left.
    pub fn retry_after(&self, identifier: &str) -> Option<Duration> {
        let live = self.live_timestamps(identifier);
        if live.len() < self.config.max_requests {
            return None;
        }

        // The request that must leave the window to free one slot.
        let blocking = live.len() - self.config.max_requests;
        let Some(&oldest) = live.get(blocking) else {
            // Zero quota never frees up.
            return Some(self.config.window);
        };
        let age = Instant::now().duration_since(oldest);
        Some(self.config.window.saturating_sub(age))
    }

    /// Forget all history for `identifier`.
    pub fn reset(&self, identifier: &str) {
        self.state.lock().windows.remove(identifier);
    }

    /// Drop every identifier with no request inside the window. Returns how
    /// many identifiers were removed.
    pub fn compact(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.last_compaction = now;
        sweep(&mut state.windows, now, self.config.window)
    }

    /// Number of identifiers currently holding a window.
    pub fn tracked_identifiers(&self) -> usize {
        self.state.lock().windows.len()
    }

    fn live_timestamps(&self, identifier: &str) -> Vec<Instant> {
        let now = Instant::now();
        let state = self.state.lock();
        state
            .windows
            .get(identifier)
            .map(|window| {
                window
                    .iter()
                    .copied()
                    .filter(|t| now.duration_since(*t) < self.config.window)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Drop timestamps that have aged out of the window.
fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&oldest) = window.front() {
        if now.duration_since(oldest) < length {
            break;
        }
        window.pop_front();
    }
}

/// Prune every window and drop the empty ones.
fn sweep(windows: &mut HashMap<String, VecDeque<Instant>>, now: Instant, length: Duration) -> usize {
    let before = windows.len();
    windows.retain(|_, window| {
        prune(window, now, length);
        !window.is_empty()
    });
    before - windows.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
