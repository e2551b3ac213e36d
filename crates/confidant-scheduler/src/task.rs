//! Registered tasks and their execution bookkeeping.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::Instant;

use crate::error::SchedulerError;

/// Type-erased task action.
pub(crate) type TaskAction = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A periodic task owned by the scheduler.
pub(crate) struct ScheduledTask {
    /// Distinguishes a task from a later one registered under the same name.
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) interval: Duration,
    pub(crate) action: TaskAction,
    pub(crate) enabled: bool,
    pub(crate) running: bool,
    pub(crate) last_run: Option<Instant>,
    pub(crate) last_run_at: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
    pub(crate) run_count: u64,
    pub(crate) failure_count: u64,
}

impl ScheduledTask {
    pub(crate) fn new(id: u64, name: String, interval: Duration, action: TaskAction) -> Self {
        Self {
            id,
            name,
            interval,
            action,
            enabled: true,
            running: false,
            last_run: None,
            last_run_at: None,
            last_error: None,
            run_count: 0,
            failure_count: 0,
        }
    }

    /// Enabled, idle, and never run or last run at least `interval` ago.
    pub(crate) fn should_run(&self, now: Instant) -> bool {
        if !self.enabled || self.running {
            return false;
        }
        match self.last_run {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    /// Record a completed run, successful or not.
    pub(crate) fn record_run(&mut self, outcome: &Result<(), SchedulerError>) {
        self.last_run = Some(Instant::now());
        self.last_run_at = Some(Utc::now());
        self.run_count += 1;
        match outcome {
            Ok(()) => self.last_error = None,
            Err(e) => {
                self.failure_count += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub(crate) fn status(&self) -> TaskStatus {
        TaskStatus {
            name: self.name.clone(),
            enabled: self.enabled,
            running: self.running,
            interval_secs: self.interval.as_secs_f64(),
            last_run_at: self.last_run_at,
            last_error: self.last_error.clone(),
            run_count: self.run_count,
            failure_count: self.failure_count,
        }
    }
}

/// Externally visible state of a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
    pub interval_secs: f64,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Error from the most recent run, if it failed.
    pub last_error: Option<String>,
    pub run_count: u64,
    pub failure_count: u64,
}

/// Run an action to completion, converting errors and panics into
/// [`SchedulerError::TaskExecution`].
pub(crate) async fn execute(name: &str, action: TaskAction) -> Result<(), SchedulerError> {
    let outcome = AssertUnwindSafe(async move { action().await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SchedulerError::TaskExecution {
            name: name.to_string(),
            message: format!("{e:#}"),
        }),
        Err(payload) => Err(SchedulerError::TaskExecution {
            name: name.to_string(),
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
