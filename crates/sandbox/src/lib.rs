//! `sandbox` crate — the contract for the sandboxed execution backend that
//! runs an agent capability, and the circuit breaker guarding it.
//!
//! The engine never cares *how* an agent runs; it hands an entry reference
//! and a validated JSON input to an [`ExecutionBackend`] and expects a JSON
//! output back within the timeout.  Every call goes through
//! [`GuardedBackend`], which owns the process-wide [`CircuitBreaker`].

pub mod breaker;
pub mod error;
pub mod guarded;
pub mod mock;
pub mod process;
pub mod schema;
pub mod traits;

pub use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
pub use error::SandboxError;
pub use guarded::GuardedBackend;
pub use process::ProcessBackend;
pub use traits::{ExecutionBackend, ExecutionOptions, ExecutionOutcome};
