//! Postgres-backed [`Store`].

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    AgentRunRow, ApprovalRow, ApprovalStatus, CapabilityRow, NewAgentRun, NewWorkflow,
    RunStatus, WorkflowNodeRow, WorkflowRow, WorkflowRunRow,
};
use crate::repository::{approvals, capabilities, runs, workflows};
use crate::{DbError, DbPool, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_workflow(&self, new: NewWorkflow) -> Result<WorkflowRow, DbError> {
        workflows::create_workflow(&self.pool, new).await
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        workflows::get_workflow(&self.pool, id).await
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        workflows::list_workflows(&self.pool).await
    }

    async fn list_active_event_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        workflows::list_active_event_workflows(&self.pool).await
    }

    async fn insert_workflow_node(&self, node: WorkflowNodeRow) -> Result<WorkflowNodeRow, DbError> {
        workflows::insert_workflow_node(&self.pool, node).await
    }

    async fn list_workflow_nodes(&self, workflow_id: Uuid) -> Result<Vec<WorkflowNodeRow>, DbError> {
        workflows::list_workflow_nodes(&self.pool, workflow_id).await
    }

    async fn create_run(
        &self,
        workflow_id: Uuid,
        trigger: &str,
        context: Value,
    ) -> Result<WorkflowRunRow, DbError> {
        runs::create_run(&self.pool, workflow_id, trigger, context).await
    }

    async fn get_run(&self, id: Uuid) -> Result<WorkflowRunRow, DbError> {
        runs::get_run(&self.pool, id).await
    }

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<WorkflowRunRow>, DbError> {
        runs::list_runs(&self.pool, workflow_id).await
    }

    async fn transition_run(
        &self,
        id: Uuid,
        from: &[RunStatus],
        to: RunStatus,
        error: Option<&str>,
    ) -> Result<bool, DbError> {
        runs::transition_run(&self.pool, id, from, to, error).await
    }

    async fn insert_agent_run(&self, new: NewAgentRun) -> Result<AgentRunRow, DbError> {
        runs::insert_agent_run(&self.pool, new).await
    }

    async fn list_agent_runs(&self, workflow_run_id: Uuid) -> Result<Vec<AgentRunRow>, DbError> {
        runs::list_agent_runs(&self.pool, workflow_run_id).await
    }

    async fn create_approval(
        &self,
        workflow_run_id: Uuid,
        node_id: &str,
    ) -> Result<ApprovalRow, DbError> {
        approvals::create_approval(&self.pool, workflow_run_id, node_id).await
    }

    async fn get_approval(&self, id: Uuid) -> Result<ApprovalRow, DbError> {
        approvals::get_approval(&self.pool, id).await
    }

    async fn list_pending_approvals(&self) -> Result<Vec<ApprovalRow>, DbError> {
        approvals::list_pending_approvals(&self.pool).await
    }

    async fn resolve_approval(
        &self,
        id: Uuid,
        decision: ApprovalStatus,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Option<ApprovalRow>, DbError> {
        approvals::resolve_approval(&self.pool, id, decision, responded_by, notes).await
    }

    async fn reject_pending_approvals(
        &self,
        workflow_run_id: Uuid,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Vec<ApprovalRow>, DbError> {
        approvals::reject_pending_approvals(&self.pool, workflow_run_id, responded_by, notes).await
    }

    async fn get_capability(&self, agent_id: Uuid, action: &str) -> Result<CapabilityRow, DbError> {
        capabilities::get_capability(&self.pool, agent_id, action).await
    }

    async fn register_capability(&self, capability: CapabilityRow) -> Result<(), DbError> {
        capabilities::upsert_capability(&self.pool, capability).await
    }
}
