//! Expiring key-value storage and a memoizing cache built on top of it.
//!
//! This crate provides:
//! - [`ExpiringStore`], a thread-safe map whose entries carry their own expiry
//!   and are evicted lazily when read
//! - [`Cache`], which memoizes the results of expensive calls keyed by a
//!   [`Fingerprint`] of the call arguments
//!
//! # Example
//!
//! ```rust,ignore
//! use confidant_cache::{Cache, CacheConfig, Fingerprint};
//!
//! let cache: Cache<String> = Cache::new(CacheConfig::default());
//! let key = Fingerprint::builder("reply").arg(&"hello").build()?;
//!
//! let reply = cache
//!     .get_or_compute(&key, None, || async { generate_reply("hello").await })
//!     .await?;
//! ```

mod cache;
mod config;
mod error;
mod fingerprint;
mod store;

pub use cache::{Cache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use store::ExpiringStore;
