//! Error types for cache operations.

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A call argument could not be serialized into a fingerprint.
    #[error("failed to fingerprint argument for '{function}': {source}")]
    Fingerprint {
        function: String,
        source: serde_json::Error,
    },
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
