//! The scheduler loop.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::task::{ScheduledTask, TaskAction, TaskStatus, execute};

/// Runs registered tasks at fixed intervals on a background loop.
///
/// A task never overlaps with itself. A failing or panicking task is logged
/// and recorded in its [`TaskStatus`]; it still counts as run, so it is next
/// attempted one full interval later, and it never stops the loop.
pub struct TaskScheduler {
    tasks: Arc<Mutex<Vec<ScheduledTask>>>,
    next_id: AtomicU64,
    config: SchedulerConfig,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskScheduler {
    /// Create a scheduler with no tasks. Nothing runs until [`start`](Self::start).
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            config,
            worker: Mutex::new(None),
        }
    }

    /// Get the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a task that runs every `interval`, first on the next tick.
    ///
    /// Tasks may be added while the loop is running.
    pub fn add_periodic_task<F, Fut>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        action: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(name));
        }

        let mut tasks = self.tasks.lock();
        if tasks.iter().any(|t| t.name == name) {
            return Err(SchedulerError::DuplicateTask(name));
        }

        let action: TaskAction = Arc::new(move || action().boxed());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(task = %name, interval_secs = interval.as_secs_f64(), "Registered periodic task");
        tasks.push(ScheduledTask::new(id, name, interval, action));
        Ok(())
    }

    /// Unregister a task. A run already in progress finishes but is not
    /// recorded. Returns whether the task existed.
    pub fn remove_task(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.name != name);
        let removed = tasks.len() != before;
        if removed {
            info!(task = %name, "Removed periodic task");
        }
        removed
    }

    /// Pause or resume a task without forgetting its history.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| SchedulerError::TaskNotFound(name.to_string()))?;
        task.enabled = enabled;
        debug!(task = %name, enabled, "Task enabled state changed");
        Ok(())
    }

    /// Status of every task, in registration order.
    pub fn list_tasks(&self) -> Vec<TaskStatus> {
        self.tasks.lock().iter().map(ScheduledTask::status).collect()
    }

    /// Run every due task once, in registration order, without waiting for
    /// the loop. Returns how many tasks ran.
    pub async fn run_pending(&self) -> usize {
        run_due(&self.tasks, None).await
    }

    /// Whether the background loop is active.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Spawn the background loop. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("Task scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.tasks),
            self.config.tick,
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });

        info!(tick_ms = self.config.tick.as_millis() as u64, "Task scheduler started");
    }

    /// Stop the background loop.
    ///
    /// No task starts a new run after this is called. A task already running
    /// gets up to the configured stop timeout to finish; past that it is
    /// aborted and [`SchedulerError::ShutdownTimeout`] is returned. Stopping
    /// a scheduler that is not running is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let Some(Worker { cancel, mut handle }) = self.worker.lock().take() else {
            return Ok(());
        };
        cancel.cancel();

        let timeout = self.config.stop_timeout;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!("Task scheduler stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                // Task panics are caught per run, so this is an abort or a
                // runtime shutdown.
                warn!(error = %e, "Task scheduler loop ended abnormally");
                Ok(())
            }
            Err(_) => {
                handle.abort();
                warn!(timeout_secs = timeout.as_secs_f64(), "Task scheduler stop timed out; aborting");
                Err(SchedulerError::ShutdownTimeout(timeout))
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

async fn run_loop(tasks: Arc<Mutex<Vec<ScheduledTask>>>, tick: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                run_due(&tasks, Some(&cancel)).await;
            }
        }
    }

    debug!("Task scheduler loop exited");
}

/// Run every task due as of now. Checks `cancel` before starting each one.
async fn run_due(tasks: &Mutex<Vec<ScheduledTask>>, cancel: Option<&CancellationToken>) -> usize {
    let now = Instant::now();
    let due: Vec<u64> = tasks
        .lock()
        .iter()
        .filter(|t| t.should_run(now))
        .map(|t| t.id)
        .collect();

    let mut ran = 0;
    for id in due {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!("Scheduler stopping; skipping remaining due tasks");
            break;
        }

        // The task may have been removed or disabled by an earlier task.
        let claimed = tasks
            .lock()
            .iter_mut()
            .find(|t| t.id == id)
            .filter(|t| t.should_run(now))
            .map(|t| {
                t.running = true;
                (t.name.clone(), Arc::clone(&t.action))
            });
        let Some((name, action)) = claimed else {
            continue;
        };

        let _running = RunningGuard { tasks, id };
        let started = Instant::now();
        debug!(task = %name, "Running scheduled task");

        let outcome = execute(&name, action).await;
        match &outcome {
            Ok(()) => debug!(
                task = %name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scheduled task completed"
            ),
            Err(e) => error!(task = %name, error = %e, "Scheduled task failed"),
        }

        if let Some(task) = tasks.lock().iter_mut().find(|t| t.id == id) {
            task.record_run(&outcome);
        }
        ran += 1;
    }
    ran
}

/// Clears a task's running flag when its run ends, including when the loop
/// is aborted mid-run.
struct RunningGuard<'a> {
    tasks: &'a Mutex<Vec<ScheduledTask>>,
    id: u64,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Some(task) = self.tasks.lock().iter_mut().find(|t| t.id == self.id) {
            task.running = false;
        }
    }
}
