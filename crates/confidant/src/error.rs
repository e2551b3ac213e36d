//! Runtime error types.

use confidant_config::ConfigError;
use confidant_scheduler::SchedulerError;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while assembling, starting or stopping the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The scheduler rejected a task or failed to stop.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The log filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    /// A global tracing subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
}
