//! The `Store` trait — every read and write the engine makes.
//!
//! Status columns are only ever changed through compare-and-set operations
//! ([`Store::transition_run`], [`Store::resolve_approval`]) so concurrently
//! executing nodes of the same run cannot clobber each other's view.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    AgentRunRow, ApprovalRow, ApprovalStatus, CapabilityRow, NewAgentRun, NewWorkflow,
    RunStatus, WorkflowNodeRow, WorkflowRow, WorkflowRunRow,
};
use crate::DbError;

#[async_trait]
pub trait Store: Send + Sync {
    // ------ workflows ------

    async fn create_workflow(&self, new: NewWorkflow) -> Result<WorkflowRow, DbError>;

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError>;

    /// All workflows, newest first.
    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError>;

    /// ACTIVE workflows whose trigger type is `event`.
    async fn list_active_event_workflows(&self) -> Result<Vec<WorkflowRow>, DbError>;

    async fn insert_workflow_node(&self, node: WorkflowNodeRow) -> Result<WorkflowNodeRow, DbError>;

    /// Nodes of a workflow in declaration order.
    async fn list_workflow_nodes(&self, workflow_id: Uuid) -> Result<Vec<WorkflowNodeRow>, DbError>;

    // ------ runs ------

    /// Create a run in PENDING with an immutable `context`.
    async fn create_run(
        &self,
        workflow_id: Uuid,
        trigger: &str,
        context: Value,
    ) -> Result<WorkflowRunRow, DbError>;

    async fn get_run(&self, id: Uuid) -> Result<WorkflowRunRow, DbError>;

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<WorkflowRunRow>, DbError>;

    /// Move a run to `to` if its current status is one of `from`.
    ///
    /// Terminal targets also stamp `finished_at`; `error` is written when
    /// given. Returns `false` (and changes nothing) when the run was not in
    /// any of the `from` states.
    async fn transition_run(
        &self,
        id: Uuid,
        from: &[RunStatus],
        to: RunStatus,
        error: Option<&str>,
    ) -> Result<bool, DbError>;

    // ------ agent runs ------

    async fn insert_agent_run(&self, new: NewAgentRun) -> Result<AgentRunRow, DbError>;

    /// Agent runs of a workflow run, in completion order.
    async fn list_agent_runs(&self, workflow_run_id: Uuid) -> Result<Vec<AgentRunRow>, DbError>;

    // ------ approvals ------

    /// Create a PENDING approval for `node_id` of `workflow_run_id`.
    async fn create_approval(
        &self,
        workflow_run_id: Uuid,
        node_id: &str,
    ) -> Result<ApprovalRow, DbError>;

    async fn get_approval(&self, id: Uuid) -> Result<ApprovalRow, DbError>;

    async fn list_pending_approvals(&self) -> Result<Vec<ApprovalRow>, DbError>;

    /// Decide a PENDING approval.
    ///
    /// Returns `None` when the approval had already been decided; decisions
    /// are terminal and first writer wins.
    async fn resolve_approval(
        &self,
        id: Uuid,
        decision: ApprovalStatus,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Option<ApprovalRow>, DbError>;

    /// Reject every approval of `workflow_run_id` that is still PENDING.
    ///
    /// Returns the rows this call decided.
    async fn reject_pending_approvals(
        &self,
        workflow_run_id: Uuid,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Vec<ApprovalRow>, DbError>;

    // ------ capability registry (read-mostly) ------

    async fn get_capability(&self, agent_id: Uuid, action: &str) -> Result<CapabilityRow, DbError>;

    async fn register_capability(&self, capability: CapabilityRow) -> Result<(), DbError>;
}
