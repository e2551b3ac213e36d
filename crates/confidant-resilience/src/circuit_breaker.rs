//! Circuit breaker for calls to unreliable dependencies.
//!
//! The breaker has three states:
//! - **Closed**: calls pass through and failures are counted.
//! - **Open**: calls are rejected without running. Once the last failure is
//!   older than the open timeout, the next call moves the breaker to
//!   half-open. There is no background timer.
//! - **Half-open**: a single trial call runs. Success closes the breaker and
//!   clears the failure count; failure opens it again.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::CircuitBreakerError;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config with the given threshold and open timeout.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
        }
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls fail fast.
    Open,
    /// One trial call is allowed.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every state change. Outcomes of calls admitted under an
    /// older generation leave the state alone.
    generation: u64,
    total_calls: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false,
            generation: 0,
            total_calls: 0,
            rejected_calls: 0,
        }
    }

    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Calls that ran the wrapped operation.
    pub total_calls: u64,
    /// Calls rejected without running.
    pub rejected_calls: u64,
}

/// Clears the half-open trial flag even if the caller drops the call
/// future before the operation completes.
struct TrialGuard<'a> {
    state: &'a Mutex<BreakerState>,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().trial_in_flight = false;
    }
}

/// Permission to run one call, tied to the generation it was granted in.
struct Admission<'a> {
    generation: u64,
    _trial: Option<TrialGuard<'a>>,
}

/// Three-state failure isolation around a fallible async operation.
///
/// Failures are counted from the moment the breaker closes; successes in the
/// closed state do not clear the count. Every error counts equally.
///
/// A call's outcome only counts against the state it was admitted in. A slow
/// call that finishes after the breaker has opened, or while a half-open
/// trial runs, does not change the state.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `name` identifies the protected dependency
    /// in logs and errors.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        debug!(
            component = %name,
            failure_threshold = config.failure_threshold,
            open_timeout_secs = config.open_timeout.as_secs(),
            "Circuit breaker initialized"
        );
        Self {
            name,
            config,
            state: Mutex::new(BreakerState::closed()),
        }
    }

    /// Name of the protected dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the breaker configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Does not trigger the open to half-open transition.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Failures recorded since the breaker last closed.
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns [`CircuitBreakerError::Open`] without running the operation
    /// when the breaker is open, or when a half-open trial is already in
    /// flight.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit()?;

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(admission.generation),
            Err(_) => self.record_failure(admission.generation),
        }
        drop(admission);

        result.map_err(CircuitBreakerError::Operation)
    }

    /// Force the breaker closed and clear its failure history.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.transition(CircuitState::Closed);
        state.failure_count = 0;
        state.last_failure_at = None;
        info!(component = %self.name, "Circuit breaker reset");
    }

    /// Get a metrics snapshot.
    pub fn snapshot(&self) -> CircuitBreakerMetrics {
        let state = self.state.lock();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            total_calls: state.total_calls,
            rejected_calls: state.rejected_calls,
        }
    }

    /// Decide whether a call may run. A half-open trial also holds the
    /// trial slot until the admission is dropped.
    fn admit<E>(&self) -> Result<Admission<'_>, CircuitBreakerError<E>> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let trial = match state.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_at
                    .map(|at| now.duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed <= self.config.open_timeout {
                    state.rejected_calls += 1;
                    return Err(self.rejection(self.config.open_timeout - elapsed));
                }
                state.transition(CircuitState::HalfOpen);
                info!(component = %self.name, "Circuit breaker half-open (testing recovery)");
                true
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    state.rejected_calls += 1;
                    return Err(self.rejection(Duration::ZERO));
                }
                true
            }
        };

        state.total_calls += 1;
        let trial = if trial {
            state.trial_in_flight = true;
            Some(TrialGuard { state: &self.state })
        } else {
            None
        };
        Ok(Admission {
            generation: state.generation,
            _trial: trial,
        })
    }

    fn rejection<E>(&self, retry_after: Duration) -> CircuitBreakerError<E> {
        debug!(component = %self.name, retry_after_ms = retry_after.as_millis() as u64, "Call rejected, circuit open");
        CircuitBreakerError::Open {
            name: self.name.clone(),
            retry_after,
        }
    }

    fn record_success(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            trace!(component = %self.name, "Ignoring success of call admitted before last transition");
            return;
        }
        if state.state == CircuitState::HalfOpen {
            state.transition(CircuitState::Closed);
            state.failure_count = 0;
            state.last_failure_at = None;
            info!(component = %self.name, "Circuit breaker closed (recovered)");
        }
    }

    fn record_failure(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            trace!(component = %self.name, "Ignoring failure of call admitted before last transition");
            return;
        }
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Instant::now());

        match state.state {
            CircuitState::HalfOpen => {
                state.transition(CircuitState::Open);
                warn!(
                    component = %self.name,
                    failure_count = state.failure_count,
                    "Circuit breaker re-opened (trial call failed)"
                );
            }
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold.max(1) => {
                state.transition(CircuitState::Open);
                warn!(
                    component = %self.name,
                    failure_count = state.failure_count,
                    failure_threshold = self.config.failure_threshold,
                    open_timeout_secs = self.config.open_timeout.as_secs(),
                    "Circuit breaker opened (failing fast)"
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep};

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::new(3, Duration::from_secs(60)))
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
        breaker.call(|| async { Err("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, CircuitBreakerError<&'static str>> {
        breaker.call(|| async { Ok(7) }).await
    }

    #[tokio::test]
    async fn test_passes_through_when_closed() {
        let breaker = breaker();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(succeed(&breaker).await.unwrap(), 7);

        let err = fail(&breaker).await.unwrap_err();
        assert!(matches!(err, CircuitBreakerError::Operation("boom")));
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_sequence() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let ran = &AtomicUsize::new(0);
        let result = breaker
            .call(move || async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(result.unwrap_err().is_open());
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(61)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        advance(Duration::from_secs(61)).await;
        let err = fail(&breaker).await.unwrap_err();
        assert!(matches!(err, CircuitBreakerError::Operation(_)));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.failure_count(), 4);

        // The cooldown restarts from the failed trial.
        advance(Duration::from_secs(30)).await;
        assert!(succeed(&breaker).await.unwrap_err().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_timeout_is_exclusive() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        advance(Duration::from_secs(60)).await;
        assert!(succeed(&breaker).await.unwrap_err().is_open());

        advance(Duration::from_millis(1)).await;
        assert!(succeed(&breaker).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_reports_retry_after() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        advance(Duration::from_secs(45)).await;

        match succeed(&breaker).await {
            Err(CircuitBreakerError::Open { name, retry_after }) => {
                assert_eq!(name, "test");
                assert_eq!(retry_after, Duration::from_secs(15));
            }
            other => panic!("expected open rejection, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_pure_observer() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        advance(Duration::from_secs(120)).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_in_half_open() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        advance(Duration::from_secs(61)).await;

        let slow_trial = breaker.call(|| async {
            sleep(Duration::from_secs(1)).await;
            Ok::<_, &str>(1)
        });
        let competing = async {
            tokio::task::yield_now().await;
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
            breaker.call(|| async { Ok::<_, &str>(2) }).await
        };

        let (trial, other) = tokio::join!(slow_trial, competing);
        assert_eq!(trial.unwrap(), 1);
        assert!(other.unwrap_err().is_open());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_frees_slot() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        advance(Duration::from_secs(61)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            breaker.call(|| async {
                sleep(Duration::from_secs(5)).await;
                Ok::<_, &str>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_does_not_override_trial() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::new(1, Duration::from_secs(60)));

        // Admitted while closed, fails long after the breaker has moved on.
        let straggler = breaker.call(|| async {
            sleep(Duration::from_secs(100)).await;
            Err::<(), _>("late")
        });

        let recovery = async {
            while breaker.snapshot().total_calls == 0 {
                tokio::task::yield_now().await;
            }
            let _ = fail(&breaker).await;
            assert_eq!(breaker.state(), CircuitState::Open);

            sleep(Duration::from_secs(61)).await;
            breaker
                .call(|| async {
                    sleep(Duration::from_secs(50)).await;
                    Ok::<_, &str>(())
                })
                .await
        };

        let (late, trial) = tokio::join!(straggler, recovery);
        assert!(matches!(late, Err(CircuitBreakerError::Operation("late"))));
        assert!(trial.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_after_recovery_is_not_counted() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::new(1, Duration::from_secs(60)));

        let straggler = breaker.call(|| async {
            sleep(Duration::from_secs(100)).await;
            Err::<(), _>("late")
        });

        let recovery = async {
            while breaker.snapshot().total_calls == 0 {
                tokio::task::yield_now().await;
            }
            let _ = fail(&breaker).await;
            sleep(Duration::from_secs(61)).await;
            assert_eq!(succeed(&breaker).await.unwrap(), 7);
        };

        let (late, ()) = tokio::join!(straggler, recovery);
        assert!(late.is_err());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_successes_do_not_clear_closed_failures() {
        let breaker = breaker();
        let _ = fail(&breaker).await;
        let _ = succeed(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_reset_and_snapshot() {
        let breaker = breaker();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        let _ = succeed(&breaker).await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.total_calls, 3);
        assert_eq!(snapshot.rejected_calls, 1);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(succeed(&breaker).await.is_ok());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(
            serde_json::to_value(CircuitState::Open).unwrap(),
            serde_json::json!("open")
        );
    }
}
