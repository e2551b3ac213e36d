//! Error types for resilience wrappers.

use std::time::Duration;

/// Error returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
///
/// Rejections are kept apart from the wrapped operation's own errors so
/// callers can apply a different retry policy to each.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker is open and the operation was not attempted.
    #[error("Circuit breaker '{name}' is open")]
    Open {
        name: String,
        /// How long until the breaker will allow a trial call.
        retry_after: Duration,
    },

    /// The operation ran and failed.
    #[error("Operation failed: {0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// Whether the call was rejected without running.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Open { .. } => None,
        }
    }
}
