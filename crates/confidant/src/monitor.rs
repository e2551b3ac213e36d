//! Request and error counters for the service health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Counts requests and errors since the process started.
#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    errors: AtomicU64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MonitorStats {
        let uptime = self.started.elapsed().as_secs_f64();
        let request_count = self.requests.load(Ordering::Relaxed);
        let error_count = self.errors.load(Ordering::Relaxed);

        MonitorStats {
            started_at: self.started_at,
            uptime_seconds: uptime,
            uptime_formatted: format_uptime(uptime),
            request_count,
            error_count,
            error_rate: if request_count > 0 {
                error_count as f64 / request_count as f64
            } else {
                0.0
            },
            requests_per_second: if uptime > 0.0 {
                request_count as f64 / uptime
            } else {
                0.0
            },
        }
    }
}

/// Snapshot of [`PerformanceMonitor`] counters.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
    /// Uptime as `HH:MM:SS`. Hours are not wrapped at 24.
    pub uptime_formatted: String,
    pub request_count: u64,
    pub error_count: u64,
    /// Errors per request, between 0 and 1 when every error has a request.
    pub error_rate: f64,
    pub requests_per_second: f64,
}

fn format_uptime(seconds: f64) -> String {
    let total = seconds as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
