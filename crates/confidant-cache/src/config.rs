//! Configuration for the response cache.

use std::time::Duration;

/// Default lifetime of a cached entry (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Configuration for [`Cache`](crate::Cache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime applied when a caller does not pass an explicit TTL.
    pub default_ttl: Duration,

    /// Prefix prepended to every fingerprint built through
    /// [`Cache::fingerprint`](crate::Cache::fingerprint).
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            key_prefix: String::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL for cached entries.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the fingerprint key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}
