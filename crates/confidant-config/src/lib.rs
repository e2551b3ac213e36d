//! Configuration for the Confidant runtime.
//!
//! Provides TOML-based configuration with one section per component:
//! ```toml
//! [cache]
//! default_ttl_secs = 300
//!
//! [session]
//! ttl_secs = 3600
//!
//! [rate_limit]
//! max_requests = 100
//! window_secs = 60
//!
//! [circuit_breaker]
//! failure_threshold = 5
//! open_timeout_secs = 60
//!
//! [scheduler]
//! tick_millis = 1000
//!
//! [logging]
//! filter = "info"
//! ```
//!
//! Every field is optional; omitted values take their defaults.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{LoadedConfig, load_config, load_config_file, save_config};
pub use error::{ConfigError, Result};
pub use types::*;
