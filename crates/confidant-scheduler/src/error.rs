//! Error types for scheduler operations.

use std::time::Duration;

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A task with this name is already registered.
    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    /// No task with this name is registered.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Periodic tasks need a non-zero interval.
    #[error("Task '{0}' has a zero interval")]
    InvalidInterval(String),

    /// The loop did not finish its current tick in time and was aborted.
    #[error("Scheduler did not stop within {0:?}; in-flight task aborted")]
    ShutdownTimeout(Duration),

    /// A task action failed or panicked. Recorded in the task's status and
    /// logged; never returned to the code that registered the task.
    #[error("Task '{name}' failed: {message}")]
    TaskExecution { name: String, message: String },
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
