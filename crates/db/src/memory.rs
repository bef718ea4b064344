//! In-memory [`Store`] for tests and single-process deployments.
//!
//! Every operation takes the one table lock for its whole read-modify-write,
//! which gives the same atomicity the Postgres store gets from single-row
//! conditional `UPDATE`s.  The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    AgentRunRow, ApprovalRow, ApprovalStatus, CapabilityRow, NewAgentRun, NewWorkflow,
    RunStatus, WorkflowNodeRow, WorkflowRow, WorkflowRunRow, WorkflowStatus,
};
use crate::{DbError, Store};

#[derive(Default)]
struct Tables {
    workflows: Vec<WorkflowRow>,
    nodes: Vec<WorkflowNodeRow>,
    runs: HashMap<Uuid, WorkflowRunRow>,
    agent_runs: Vec<AgentRunRow>,
    approvals: HashMap<Uuid, ApprovalRow>,
    capabilities: HashMap<(Uuid, String), CapabilityRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_workflow(&self, new: NewWorkflow) -> Result<WorkflowRow, DbError> {
        let row = WorkflowRow {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            name: new.name,
            trigger: new.trigger,
            status: new.status,
            created_at: Utc::now(),
        };
        self.tables().workflows.push(row.clone());
        Ok(row)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        self.tables()
            .workflows
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        let mut rows = self.tables().workflows.clone();
        rows.reverse();
        Ok(rows)
    }

    async fn list_active_event_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        Ok(self
            .tables()
            .workflows
            .iter()
            .filter(|w| w.status == WorkflowStatus::Active && w.trigger["type"] == "event")
            .cloned()
            .collect())
    }

    async fn insert_workflow_node(&self, node: WorkflowNodeRow) -> Result<WorkflowNodeRow, DbError> {
        let mut tables = self.tables();
        if !tables.workflows.iter().any(|w| w.id == node.workflow_id) {
            return Err(DbError::NotFound);
        }
        tables.nodes.push(node.clone());
        Ok(node)
    }

    async fn list_workflow_nodes(&self, workflow_id: Uuid) -> Result<Vec<WorkflowNodeRow>, DbError> {
        let mut nodes: Vec<WorkflowNodeRow> = self
            .tables()
            .nodes
            .iter()
            .filter(|n| n.workflow_id == workflow_id)
            .cloned()
            .collect();
        nodes.sort_by_key(|n| n.position);
        Ok(nodes)
    }

    async fn create_run(
        &self,
        workflow_id: Uuid,
        trigger: &str,
        context: Value,
    ) -> Result<WorkflowRunRow, DbError> {
        let mut tables = self.tables();
        if !tables.workflows.iter().any(|w| w.id == workflow_id) {
            return Err(DbError::NotFound);
        }
        let row = WorkflowRunRow {
            id: Uuid::new_v4(),
            workflow_id,
            trigger: trigger.to_owned(),
            context,
            status: RunStatus::Pending,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        tables.runs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_run(&self, id: Uuid) -> Result<WorkflowRunRow, DbError> {
        self.tables().runs.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<WorkflowRunRow>, DbError> {
        let mut rows: Vec<WorkflowRunRow> = self
            .tables()
            .runs
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }

    async fn transition_run(
        &self,
        id: Uuid,
        from: &[RunStatus],
        to: RunStatus,
        error: Option<&str>,
    ) -> Result<bool, DbError> {
        let mut tables = self.tables();
        let Some(run) = tables.runs.get_mut(&id) else {
            return Ok(false);
        };
        if !from.contains(&run.status) {
            return Ok(false);
        }

        run.status = to;
        if let Some(error) = error {
            run.error = Some(error.to_owned());
        }
        if to.is_terminal() {
            run.finished_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn insert_agent_run(&self, new: NewAgentRun) -> Result<AgentRunRow, DbError> {
        let row = AgentRunRow {
            id: Uuid::new_v4(),
            agent_id: new.agent_id,
            workflow_run_id: new.workflow_run_id,
            node_id: new.node_id,
            input: new.input,
            output: new.output,
            status: new.status,
            error: new.error,
            duration_ms: new.duration_ms,
            finished_at: Utc::now(),
        };
        self.tables().agent_runs.push(row.clone());
        Ok(row)
    }

    async fn list_agent_runs(&self, workflow_run_id: Uuid) -> Result<Vec<AgentRunRow>, DbError> {
        Ok(self
            .tables()
            .agent_runs
            .iter()
            .filter(|r| r.workflow_run_id == workflow_run_id)
            .cloned()
            .collect())
    }

    async fn create_approval(
        &self,
        workflow_run_id: Uuid,
        node_id: &str,
    ) -> Result<ApprovalRow, DbError> {
        let row = ApprovalRow {
            id: Uuid::new_v4(),
            workflow_run_id,
            node_id: node_id.to_owned(),
            status: ApprovalStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            responded_by: None,
            notes: None,
        };
        self.tables().approvals.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_approval(&self, id: Uuid) -> Result<ApprovalRow, DbError> {
        self.tables().approvals.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn list_pending_approvals(&self) -> Result<Vec<ApprovalRow>, DbError> {
        let mut rows: Vec<ApprovalRow> = self
            .tables()
            .approvals
            .values()
            .filter(|a| a.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.requested_at);
        Ok(rows)
    }

    async fn resolve_approval(
        &self,
        id: Uuid,
        decision: ApprovalStatus,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Option<ApprovalRow>, DbError> {
        if decision == ApprovalStatus::Pending {
            return Err(DbError::InvalidDecision(decision.to_string()));
        }

        let mut tables = self.tables();
        let approval = tables.approvals.get_mut(&id).ok_or(DbError::NotFound)?;
        if approval.status != ApprovalStatus::Pending {
            return Ok(None);
        }

        approval.status = decision;
        approval.responded_at = Some(Utc::now());
        approval.responded_by = Some(responded_by.to_owned());
        approval.notes = notes.map(str::to_owned);
        Ok(Some(approval.clone()))
    }

    async fn reject_pending_approvals(
        &self,
        workflow_run_id: Uuid,
        responded_by: &str,
        notes: Option<&str>,
    ) -> Result<Vec<ApprovalRow>, DbError> {
        let now = Utc::now();
        let mut tables = self.tables();
        let rejected = tables
            .approvals
            .values_mut()
            .filter(|a| a.workflow_run_id == workflow_run_id && a.status == ApprovalStatus::Pending)
            .map(|approval| {
                approval.status = ApprovalStatus::Rejected;
                approval.responded_at = Some(now);
                approval.responded_by = Some(responded_by.to_owned());
                approval.notes = notes.map(str::to_owned);
                approval.clone()
            })
            .collect();
        Ok(rejected)
    }

    async fn get_capability(&self, agent_id: Uuid, action: &str) -> Result<CapabilityRow, DbError> {
        self.tables()
            .capabilities
            .get(&(agent_id, action.to_owned()))
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn register_capability(&self, capability: CapabilityRow) -> Result<(), DbError> {
        self.tables()
            .capabilities
            .insert((capability.agent_id, capability.action.clone()), capability);
        Ok(())
    }
}
