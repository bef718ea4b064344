//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the DAG scheduler:
//! 1. Claims a PENDING run (compare-and-set to RUNNING).
//! 2. Plans the node graph into dependency batches.
//! 3. Runs each batch concurrently, feeding every node a view of the run
//!    context plus the outputs of all earlier batches.
//! 4. Appends an `agent_runs` row per executed node.
//! 5. Fails fast: the first node error drops the rest of its batch, no later
//!    batch is scheduled, and the run is marked FAILED with the message.
//!    Approvals a dropped node left PENDING are rejected by the system.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use db::models::{AgentRunStatus, CapabilityRow, NewAgentRun, RiskLevel, RunStatus, WorkflowRunRow};
use db::{DbError, Store};
use sandbox::{schema, ExecutionBackend, ExecutionOptions, GuardedBackend, SandboxError};

use crate::approval::{ApprovalGate, ApprovalRequest, RUN_FAILED_NOTE, SYSTEM_RESPONDER};
use crate::dag::plan_batches;
use crate::template::{self, Resolution, Scope};
use crate::{EngineError, Workflow, WorkflowNode};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock budget for one backend call.
    pub execution_timeout: Duration,
    /// Memory ceiling passed to the backend.
    pub memory_limit_mb: u64,
    /// Capabilities at or above this risk level are gated even when the
    /// node does not ask for approval. `None` disables the rule.
    pub approval_risk_threshold: Option<RiskLevel>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(300),
            memory_limit_mb: 512,
            approval_risk_threshold: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Node ids per batch, in execution order.
    pub batches: Vec<Vec<String>>,
    /// Output of every node, keyed by node id.
    pub outputs: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Runs workflow runs to completion.
///
/// One executor is shared by every run in the process; it holds no per-run
/// state, so concurrent calls to [`WorkflowExecutor::run`] are independent.
pub struct WorkflowExecutor {
    store: Arc<dyn Store>,
    backend: GuardedBackend,
    gate: ApprovalGate,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        backend: GuardedBackend,
        gate: ApprovalGate,
        config: ExecutorConfig,
    ) -> Self {
        Self { store, backend, gate, config }
    }

    /// Execute a PENDING run.
    ///
    /// # Errors
    /// [`EngineError::RunNotPending`] if the run was already claimed;
    /// otherwise the error that failed the run, after the run row has been
    /// marked FAILED.
    #[instrument(skip(self))]
    pub async fn run(&self, run_id: Uuid) -> Result<RunSummary, EngineError> {
        let run = self.store.get_run(run_id).await?;

        let claimed = self
            .store
            .transition_run(run_id, &[RunStatus::Pending], RunStatus::Running, None)
            .await?;
        if !claimed {
            let current = self.store.get_run(run_id).await?;
            return Err(EngineError::RunNotPending { run_id, status: current.status });
        }

        match self.drive(&run).await {
            Ok(summary) => {
                self.store
                    .transition_run(
                        run_id,
                        &[RunStatus::Running, RunStatus::WaitingApproval],
                        RunStatus::Success,
                        None,
                    )
                    .await?;
                info!(nodes = summary.outputs.len(), "run succeeded");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "run failed");
                let message = e.to_string();
                if let Err(db_err) = self
                    .store
                    .transition_run(
                        run_id,
                        &[RunStatus::Running, RunStatus::WaitingApproval],
                        RunStatus::Failed,
                        Some(&message),
                    )
                    .await
                {
                    error!(error = %db_err, "could not record run failure");
                }
                self.withdraw_approvals(run_id).await;
                Err(e)
            }
        }
    }

    /// Reject approvals left PENDING by gated nodes that fail-fast dropped.
    async fn withdraw_approvals(&self, run_id: Uuid) {
        match self
            .store
            .reject_pending_approvals(run_id, SYSTEM_RESPONDER, Some(RUN_FAILED_NOTE))
            .await
        {
            Ok(rejected) => {
                for approval in &rejected {
                    warn!(approval_id = %approval.id, node_id = %approval.node_id, "approval withdrawn");
                }
            }
            Err(e) => error!(error = %e, "could not withdraw pending approvals"),
        }
    }

    async fn drive(&self, run: &WorkflowRunRow) -> Result<RunSummary, EngineError> {
        let workflow = Workflow::load(self.store.as_ref(), run.workflow_id).await?;
        let batches = plan_batches(&workflow.nodes)?;
        info!(workflow = %workflow.name, ?batches, "planned batches");

        let nodes: HashMap<&str, &WorkflowNode> =
            workflow.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut outputs: HashMap<String, Value> = HashMap::new();

        for (index, batch) in batches.iter().enumerate() {
            debug!(batch = index, nodes = ?batch, "starting batch");
            let scope = Scope { context: &run.context, outputs: &outputs };

            let results = try_join_all(
                batch
                    .iter()
                    .map(|id| self.execute_node(run.id, nodes[id.as_str()], scope)),
            )
            .await?;

            for (id, output) in batch.iter().zip(results) {
                outputs.insert(id.clone(), output);
            }
        }

        Ok(RunSummary { run_id: run.id, batches, outputs })
    }

    // -----------------------------------------------------------------------
    // Internal: one node.
    // -----------------------------------------------------------------------

    async fn execute_node(
        &self,
        run_id: Uuid,
        node: &WorkflowNode,
        scope: Scope<'_>,
    ) -> Result<Value, EngineError> {
        let Resolution { value: input, unresolved } = template::resolve(&node.inputs, &scope);
        for placeholder in &unresolved {
            warn!(node_id = %node.id, %placeholder, "unresolved placeholder left verbatim");
        }

        let capability = match self.store.get_capability(node.agent_id, &node.action).await {
            Ok(capability) => capability,
            Err(DbError::NotFound) => {
                return Err(EngineError::CapabilityNotFound {
                    agent_id: node.agent_id,
                    action: node.action.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if self.requires_approval(node, &capability) {
            self.gate
                .request(ApprovalRequest {
                    run_id,
                    node_id: &node.id,
                    agent_name: &capability.agent_name,
                    action: &node.action,
                    inputs: &input,
                })
                .await?;
        }

        let started = Instant::now();
        let result = self.invoke(node, &capability, input.clone()).await;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let (status, output, error) = match &result {
            Ok(output) => (AgentRunStatus::Success, Some(output.clone()), None),
            Err(e) => (AgentRunStatus::Failed, None, Some(e.to_string())),
        };
        self.store
            .insert_agent_run(NewAgentRun {
                agent_id: node.agent_id,
                workflow_run_id: run_id,
                node_id: node.id.clone(),
                input,
                output,
                status,
                error,
                duration_ms,
            })
            .await?;

        match &result {
            Ok(_) => info!(node_id = %node.id, duration_ms, "node succeeded"),
            Err(e) => warn!(node_id = %node.id, duration_ms, error = %e, "node failed"),
        }
        result
    }

    /// Validate, call the backend, validate again.
    async fn invoke(
        &self,
        node: &WorkflowNode,
        capability: &CapabilityRow,
        input: Value,
    ) -> Result<Value, EngineError> {
        let failed = |message: String| EngineError::NodeFailed {
            node_id: node.id.clone(),
            message,
        };

        schema::validate(&capability.input_schema, &input)
            .map_err(|e| failed(format!("input rejected: {e}")))?;

        let options = ExecutionOptions {
            memory_limit_mb: self.config.memory_limit_mb,
            timeout: self.config.execution_timeout,
            output_schema: (!capability.output_schema.is_null())
                .then(|| capability.output_schema.clone()),
        };

        let outcome = self
            .backend
            .execute(&capability.entry_reference, input, options)
            .await
            .map_err(|e| match e {
                SandboxError::CircuitOpen => EngineError::CircuitOpen { node_id: node.id.clone() },
                other => failed(other.to_string()),
            })?;

        let output = outcome.output.unwrap_or(Value::Null);
        schema::validate(&capability.output_schema, &output)
            .map_err(|e| failed(format!("output rejected: {e}")))?;

        Ok(output)
    }

    fn requires_approval(&self, node: &WorkflowNode, capability: &CapabilityRow) -> bool {
        if node.approval_required {
            return true;
        }
        self.config
            .approval_risk_threshold
            .is_some_and(|threshold| node.risk_level.max(capability.risk_level) >= threshold)
    }
}
