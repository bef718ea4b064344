//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

use db::models::RunStatus;

/// Errors produced by the workflow engine (planning + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Configuration errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// A node depends on an ID that doesn't exist in the workflow.
    #[error("node '{node_id}' depends on unknown node '{dependency}'")]
    UnknownDependency { node_id: String, dependency: String },

    /// Batch planning found nodes that can never become eligible.
    #[error("workflow graph contains a cycle among: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },

    /// A stored definition could not be interpreted.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// A node references an agent action the registry doesn't know.
    #[error("no capability '{action}' registered for agent {agent_id}")]
    CapabilityNotFound { agent_id: Uuid, action: String },

    // ------ Run lifecycle errors ------

    /// Runs are only started from PENDING.
    #[error("run {run_id} is {status}, not PENDING")]
    RunNotPending { run_id: Uuid, status: RunStatus },

    /// Disabled workflows cannot be started.
    #[error("workflow {0} is disabled")]
    WorkflowDisabled(Uuid),

    // ------ Node errors ------

    /// A reviewer rejected the node, or the approval timed out.
    #[error("approval rejected for node '{node_id}': {notes}")]
    ApprovalRejected { node_id: String, notes: String },

    /// The node ran (or tried to) and failed.
    #[error("node '{node_id}' failed: {message}")]
    NodeFailed { node_id: String, message: String },

    /// The circuit breaker refused to call the backend.
    #[error("node '{node_id}' not executed: execution backend circuit is open")]
    CircuitOpen { node_id: String },

    // ------ Collaborator errors ------

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// Message bus error, including malformed subject patterns.
    #[error("bus error: {0}")]
    Bus(#[from] bus::BusError),
}
