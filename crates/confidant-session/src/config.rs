//! Configuration for the session manager.

use std::time::Duration;

/// Default session lifetime without activity (1 hour).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity period after which a session expires, unless the caller
    /// passes its own TTL to [`SessionManager::create`](crate::SessionManager::create).
    pub default_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}
