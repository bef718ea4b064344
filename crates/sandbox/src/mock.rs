//! `MockBackend` — a test double for `ExecutionBackend`.
//!
//! Behaviour is scripted per entry reference; unscripted entries echo their
//! input back.  Every call is recorded so tests can assert on the resolved
//! inputs an agent actually received.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExecutionBackend, ExecutionOptions, ExecutionOutcome, SandboxError};

/// Behaviour injected for one entry reference.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Succeed with a specific JSON value.
    Return(Value),
    /// Succeed with the input unchanged.
    Echo,
    /// Run and report `success: false`.
    Fail(String),
    /// Fail to run at all.
    Unavailable(String),
    /// Never finish.
    Hang,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub entry_reference: String,
    pub input: Value,
    pub memory_limit_mb: u64,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    behaviours: HashMap<String, MockBehaviour>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry_reference: impl Into<String>, behaviour: MockBehaviour) -> Self {
        self.behaviours.insert(entry_reference.into(), behaviour);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Inputs received by `entry_reference`, in call order.
    pub fn inputs_for(&self, entry_reference: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.entry_reference == entry_reference)
            .map(|c| c.input.clone())
            .collect()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn execute(
        &self,
        entry_reference: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<ExecutionOutcome, SandboxError> {
        self.calls.lock().unwrap().push(MockCall {
            entry_reference: entry_reference.to_owned(),
            input: input.clone(),
            memory_limit_mb: options.memory_limit_mb,
        });

        match self.behaviours.get(entry_reference).unwrap_or(&MockBehaviour::Echo) {
            MockBehaviour::Return(v) => Ok(ExecutionOutcome::succeeded(v.clone(), 1)),
            MockBehaviour::Echo => Ok(ExecutionOutcome::succeeded(input, 1)),
            MockBehaviour::Fail(msg) => Ok(ExecutionOutcome::failed(msg.clone(), 1)),
            MockBehaviour::Unavailable(msg) => Err(SandboxError::Unavailable(msg.clone())),
            MockBehaviour::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
        }
    }
}
