//! Circuit breaker guarding one remote operation.
//!
//! State transitions:
//! - Closed -> Open: after `threshold` consecutive failures
//! - Open -> HalfOpen: once `reset_timeout` has elapsed since the last failure
//! - HalfOpen -> Closed: the trial call succeeds
//! - HalfOpen -> Open: the trial call fails (refreshes the last failure time)
//!
//! HalfOpen is not stored; it is "open, and the reset timeout has elapsed".
//! Only one trial call runs at a time, concurrent callers are rejected until
//! it finishes. Only the trial decides whether an open circuit closes; a call
//! admitted while the circuit was still closed that finishes late never does.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Breaker state as observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub threshold: u32,
    /// Per-call limit; exceeding it counts as a failure.
    pub timeout: Duration,
    /// How long the circuit stays open before a trial call is allowed.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_secs(130),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    open: bool,
    trial_in_flight: bool,
}

/// Circuit breaker around one logical operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state (for monitoring).
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        if !inner.open {
            CircuitState::Closed
        } else if self.reset_elapsed(&inner) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Force the circuit closed.
    pub fn reset(&self) {
        *self.lock() = Inner::default();
    }

    /// Run `operation` through the breaker.
    ///
    /// While open, returns [`Error::circuit_open`] without calling `operation`.
    /// A call that exceeds the configured timeout fails with a
    /// `ConnectionTimeout` error and counts as a failure.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let trial = self.admit()?;

        let outcome = match timeout(self.config.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(Error::connection_timeout(format!(
                "Operation timed out after {}ms",
                self.config.timeout.as_millis()
            ))
            .with_context("operation", &self.name)),
        };

        let is_trial = trial.breaker.is_some();
        match &outcome {
            Ok(_) => self.record_success(is_trial),
            Err(e) => self.record_failure(e, is_trial),
        }
        trial.disarm();
        outcome
    }

    fn admit(&self) -> Result<TrialGuard<'_>> {
        let mut inner = self.lock();
        if !inner.open {
            return Ok(TrialGuard { breaker: None });
        }
        if self.reset_elapsed(&inner) && !inner.trial_in_flight {
            inner.trial_in_flight = true;
            debug!(breaker = %self.name, "circuit half-open, allowing trial call");
            return Ok(TrialGuard {
                breaker: Some(self),
            });
        }
        Err(Error::circuit_open().with_context("operation", &self.name))
    }

    fn record_success(&self, is_trial: bool) {
        let mut inner = self.lock();
        if is_trial {
            debug!(breaker = %self.name, "trial call succeeded, circuit closed");
            *inner = Inner::default();
        } else if !inner.open {
            inner.failure_count = 0;
            inner.last_failure_at = None;
        }
    }

    fn record_failure(&self, error: &Error, is_trial: bool) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());

        if is_trial {
            inner.trial_in_flight = false;
            if inner.open {
                warn!(breaker = %self.name, error = %error, "trial call failed, circuit re-opened");
            }
        } else if !inner.open && inner.failure_count >= self.config.threshold {
            inner.open = true;
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                error = %error,
                "circuit opened"
            );
        }
    }

    fn reset_elapsed(&self, inner: &Inner) -> bool {
        inner
            .last_failure_at
            .is_none_or(|at| at.elapsed() >= self.config.reset_timeout)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the half-open trial slot if the calling future is dropped mid-call.
struct TrialGuard<'a> {
    breaker: Option<&'a CircuitBreaker>,
}

impl TrialGuard<'_> {
    fn disarm(mut self) {
        self.breaker = None;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker {
            breaker.lock().trial_in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorCode, ErrorKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, timeout_ms: u64, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                threshold,
                timeout: Duration::from_millis(timeout_ms),
                reset_timeout: Duration::from_millis(reset_ms),
            },
        )
    }

    async fn always_fails(calls: &AtomicU32) -> Result<&'static str> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::remote("Always fails", None, None))
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let breaker = breaker(3, 100, 1000);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let err = breaker.call(|| always_fails(&calls)).await.unwrap_err();
            assert_eq!(err.message(), "Always fails");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(err.message(), "Circuit breaker is open");
        assert_eq!(err.code(), ErrorCode::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let breaker = breaker(3, 100, 1000);
        let err = breaker
            .call(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok("success")
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConnectionTimeout);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_call_after_reset_timeout_closes_circuit() {
        let breaker = breaker(2, 100, 100);
        let calls = AtomicU32::new(0);

        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        let err = breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircuitOpen);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let value = breaker.call(|| async { Ok("success") }).await.unwrap();
        assert_eq!(value, "success");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_circuit() {
        let breaker = breaker(1, 100, 100);
        let calls = AtomicU32::new(0);

        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(150)).await;

        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let breaker = breaker(3, 100, 1000);
        let calls = AtomicU32::new(0);

        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(breaker.failure_count(), 2);

        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_results_from_before_opening_leave_the_trial_alone() {
        let breaker = Arc::new(breaker(1, 10_000, 100));
        let calls = AtomicU32::new(0);

        let (finish_slow, slow_done) = tokio::sync::oneshot::channel::<bool>();
        let slow = tokio::spawn({
            let breaker = Arc::clone(&breaker);
            async move {
                breaker
                    .call(|| async move {
                        match slow_done.await {
                            Ok(true) => Ok(()),
                            _ => Err(Error::remote("late failure", None, None)),
                        }
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_millis(150)).await;

        let (finish_trial, trial_done) = tokio::sync::oneshot::channel::<()>();
        let trial = tokio::spawn({
            let breaker = Arc::clone(&breaker);
            async move {
                breaker
                    .call(|| async move {
                        let _ = trial_done.await;
                        Ok(())
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        // A success admitted before the circuit opened does not close it.
        finish_slow.send(true).unwrap();
        slow.await.unwrap().unwrap();
        assert_ne!(breaker.state(), CircuitState::Closed);

        // The trial slot is still taken.
        let err = breaker.call(|| always_fails(&calls)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircuitOpen);

        finish_trial.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_failure_does_not_free_the_trial_slot() {
        let breaker = Arc::new(breaker(1, 10_000, 100));

        let (finish_slow, slow_done) = tokio::sync::oneshot::channel::<bool>();
        let slow = tokio::spawn({
            let breaker = Arc::clone(&breaker);
            async move {
                breaker
                    .call(|| async move {
                        let _ = slow_done.await;
                        Err::<(), _>(Error::remote("late failure", None, None))
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        let calls = AtomicU32::new(0);
        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(150)).await;

        let (_hold_trial, trial_done) = tokio::sync::oneshot::channel::<()>();
        let trial = tokio::spawn({
            let breaker = Arc::clone(&breaker);
            async move {
                breaker
                    .call(|| async move {
                        let _ = trial_done.await;
                        Ok(())
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        finish_slow.send(true).unwrap();
        slow.await.unwrap().unwrap_err();
        tokio::time::advance(Duration::from_millis(150)).await;

        let err = breaker.call(|| async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircuitOpen);
        trial.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_frees_the_slot() {
        let breaker = breaker(1, 10_000, 100);
        let calls = AtomicU32::new(0);
        breaker.call(|| always_fails(&calls)).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(150)).await;

        let pending = breaker.call(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;

        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
