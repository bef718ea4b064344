//! The `ExecutionBackend` trait — the contract every backend must fulfil.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SandboxError;

/// Limits and validation hints passed with every execution.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub memory_limit_mb: u64,
    pub timeout: Duration,
    /// The capability's declared output schema, for backend-side validation.
    pub output_schema: Option<Value>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            memory_limit_mb: 512,
            timeout: Duration::from_secs(300),
            output_schema: None,
        }
    }
}

/// What the backend reports back for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ExecutionOutcome {
    pub fn succeeded(output: Value, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            execution_time_ms,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            execution_time_ms,
        }
    }
}

/// Runs one agent capability in isolation.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Execute the code behind `entry_reference` with `input`.
    ///
    /// `Err` is reserved for the backend failing to run the agent at all;
    /// an agent that ran and failed is reported as `success: false`.
    async fn execute(
        &self,
        entry_reference: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<ExecutionOutcome, SandboxError>;
}
