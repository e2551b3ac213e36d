//! Error types for session operations.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session does not exist or has already expired.
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
