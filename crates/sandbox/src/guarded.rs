//! `GuardedBackend` — routes every execution through the shared breaker.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::{
    BreakerError, CircuitBreaker, ExecutionBackend, ExecutionOptions, ExecutionOutcome,
    SandboxError,
};

/// Wraps a real backend with a wall-clock timeout and the circuit breaker.
///
/// Anything other than a successful outcome counts against the breaker:
/// transport errors, timeouts, and `success: false` reports alike.  A
/// successful return from `execute` therefore always has `success == true`.
#[derive(Clone)]
pub struct GuardedBackend {
    inner: Arc<dyn ExecutionBackend>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedBackend {
    pub fn new(inner: Arc<dyn ExecutionBackend>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl ExecutionBackend for GuardedBackend {
    async fn execute(
        &self,
        entry_reference: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<ExecutionOutcome, SandboxError> {
        let timeout = options.timeout;

        let result = self
            .breaker
            .call(|| async {
                let outcome =
                    tokio::time::timeout(timeout, self.inner.execute(entry_reference, input, options))
                        .await
                        .map_err(|_| SandboxError::Timeout(timeout.as_secs()))??;

                if outcome.success {
                    Ok(outcome)
                } else {
                    Err(SandboxError::Failed(
                        outcome
                            .error
                            .unwrap_or_else(|| "agent reported failure without detail".into()),
                    ))
                }
            })
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(BreakerError::Open) => {
                warn!(entry = entry_reference, "execution rejected: circuit open");
                Err(SandboxError::CircuitOpen)
            }
            Err(BreakerError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockBehaviour};
    use crate::{BreakerConfig, BreakerState};
    use serde_json::json;
    use std::time::Duration;

    fn guarded(mock: &MockBackend, threshold: u32) -> GuardedBackend {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            ..BreakerConfig::default()
        });
        GuardedBackend::new(Arc::new(mock.clone()), Arc::new(breaker))
    }

    #[tokio::test]
    async fn reported_failures_trip_the_breaker() {
        let mock = MockBackend::new().with_entry("flaky", MockBehaviour::Fail("bad input".into()));
        let backend = guarded(&mock, 2);

        for _ in 0..2 {
            let err = backend
                .execute("flaky", json!({}), ExecutionOptions::default())
                .await
                .unwrap_err();
            assert_eq!(err, SandboxError::Failed("bad input".into()));
        }

        let err = backend
            .execute("flaky", json!({}), ExecutionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::CircuitOpen);
        assert_eq!(backend.breaker().state(), BreakerState::Open);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_times_out() {
        let mock = MockBackend::new().with_entry("slow", MockBehaviour::Hang);
        let backend = guarded(&mock, 5);

        let options = ExecutionOptions {
            timeout: Duration::from_secs(3),
            ..ExecutionOptions::default()
        };
        let err = backend.execute("slow", json!({}), options).await.unwrap_err();
        assert_eq!(err, SandboxError::Timeout(3));
        assert_eq!(backend.breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let mock = MockBackend::new().with_entry("ok", MockBehaviour::Return(json!({ "n": 1 })));
        let backend = guarded(&mock, 5);

        let outcome = backend
            .execute("ok", json!({}), ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.output, Some(json!({ "n": 1 })));
    }
}
