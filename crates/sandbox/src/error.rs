//! Backend-level error type.

use thiserror::Error;

/// Errors returned by an [`ExecutionBackend`](crate::ExecutionBackend).
///
/// `CircuitOpen` is never produced by a backend itself; it means the call
/// was refused before reaching one, so callers can apply a different retry
/// policy than for a genuine failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The agent ran and reported failure.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The agent did not finish within its wall-clock budget.
    #[error("execution timed out after {0}s")]
    Timeout(u64),

    /// The backend itself could not run the agent.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Input or output did not satisfy the declared schema.
    #[error("schema violation: {0}")]
    Schema(String),

    /// The circuit breaker refused the call.
    #[error("circuit open: execution backend is unhealthy")]
    CircuitOpen,
}
