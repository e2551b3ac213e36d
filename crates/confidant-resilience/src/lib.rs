//! Admission control and failure isolation.
//!
//! - [`RateLimiter`] admits at most `max_requests` per identifier within a
//!   trailing window. HTTP handlers call it before doing any work.
//! - [`CircuitBreaker`] wraps calls to an unreliable dependency and fails
//!   fast while that dependency keeps failing.
//!
//! ```rust,ignore
//! use confidant_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
//!
//! let breaker = CircuitBreaker::new("webhook", CircuitBreakerConfig::default());
//! match breaker.call(|| deliver(&payload)).await {
//!     Ok(receipt) => { /* delivered */ }
//!     Err(CircuitBreakerError::Open { retry_after, .. }) => { /* back off */ }
//!     Err(CircuitBreakerError::Operation(e)) => { /* provider error */ }
//! }
//! ```

mod circuit_breaker;
mod error;
mod ratelimit;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
pub use error::CircuitBreakerError;
pub use ratelimit::{RateLimitConfig, RateLimiter};
