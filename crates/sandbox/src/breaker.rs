//! Circuit breaker around calls into the execution backend.
//!
//! ```text
//!   CLOSED --(threshold failures)--> OPEN --(reset timeout)--> HALF_OPEN
//!     ^                               ^                           |
//!     |                               +------(any failure)--------+
//!     +-----------(N consecutive trial successes)-----------------+
//! ```
//!
//! One breaker instance guards every backend call in the process.  State
//! lives behind a single mutex that is never held across an `.await`, so the
//! wrapped future runs unlocked and concurrent callers only contend on the
//! bookkeeping.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Tuning knobs for the breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures within the monitoring window that trip the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays OPEN before admitting trial calls.
    pub reset_timeout: Duration,
    /// Failures older than this no longer count towards the threshold.
    pub monitoring_window: Duration,
    /// Consecutive trial successes needed to close again.
    pub half_open_successes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_secs(120),
            half_open_successes: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Either the breaker refused the call, or the call itself failed.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    trial_successes: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure: None,
                opened_at: None,
                trial_successes: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Run `f` unless the breaker is open, recording its outcome.
    ///
    /// A call dropped before `f` completes is counted as neither success nor failure.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.lock();
        if inner.state != BreakerState::Open {
            return Ok(());
        }

        let cooled = inner
            .opened_at
            .is_some_and(|at| at.elapsed() >= self.config.reset_timeout);
        if cooled {
            info!("circuit breaker half-open; admitting trial calls");
            inner.state = BreakerState::HalfOpen;
            inner.trial_successes = 0;
            Ok(())
        } else {
            Err(BreakerError::Open)
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.half_open_successes {
                    info!("circuit breaker closed after {} trial successes", inner.trial_successes);
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.last_failure = None;
                    inner.opened_at = None;
                    inner.trial_successes = 0;
                }
            }
            BreakerState::Closed => {
                let window_passed = inner
                    .last_failure
                    .is_some_and(|at| at.elapsed() >= self.config.monitoring_window);
                if window_passed {
                    inner.failures = 0;
                    inner.last_failure = None;
                }
            }
            // A call admitted before a sibling trial re-opened the breaker.
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        let now = Instant::now();

        let stale = inner
            .last_failure
            .is_some_and(|at| now.duration_since(at) >= self.config.monitoring_window);
        if stale && inner.state == BreakerState::Closed {
            inner.failures = 0;
        }

        inner.failures += 1;
        inner.last_failure = Some(now);

        match inner.state {
            BreakerState::HalfOpen => {
                warn!("trial call failed; circuit breaker re-opened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.trial_successes = 0;
            }
            BreakerState::Closed if inner.failures >= self.config.failure_threshold => {
                warn!(failures = inner.failures, "circuit breaker opened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
            }
            _ => {}
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
