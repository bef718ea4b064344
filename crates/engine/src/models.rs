//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory.  They are assembled from the `workflows` / `workflow_nodes` rows
//! and can be read from or written to a JSON definition document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use db::models::{NewWorkflow, RiskLevel, WorkflowNodeRow, WorkflowRow, WorkflowStatus};
use db::Store;

use crate::dag::plan_batches;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Started explicitly through the API.
    Manual,
    /// Started whenever a bus event's subject matches `pattern`.
    Event {
        /// Subject pattern, e.g. `graph.file.*` or `graph.>`.
        pattern: String,
    },
}

// ---------------------------------------------------------------------------
// WorkflowNode
// ---------------------------------------------------------------------------

/// A single agent invocation in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier within this workflow (referenced by `depends_on`
    /// and by `{{nodes.<id>.output…}}` placeholders).
    pub id: String,
    pub agent_id: Uuid,
    /// The capability of the agent to invoke.
    pub action: String,
    /// Input document with `{{…}}` placeholders.
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl WorkflowNode {
    fn from_row(row: WorkflowNodeRow) -> Self {
        Self {
            id: row.id,
            agent_id: row.agent_id,
            action: row.action,
            inputs: row.inputs_template,
            depends_on: row.depends_on,
            approval_required: row.approval_required,
            risk_level: row.risk_level,
        }
    }

    fn to_row(&self, workflow_id: Uuid, position: i32) -> WorkflowNodeRow {
        WorkflowNodeRow {
            id: self.id.clone(),
            workflow_id,
            agent_id: self.agent_id,
            action: self.action.clone(),
            inputs_template: self.inputs.clone(),
            depends_on: self.depends_on.clone(),
            approval_required: self.approval_required,
            risk_level: self.risk_level,
            position,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A stored workflow with its nodes in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub status: WorkflowStatus,
    pub nodes: Vec<WorkflowNode>,
}

impl Workflow {
    /// Assemble the domain view from persisted rows.
    pub fn from_rows(row: WorkflowRow, nodes: Vec<WorkflowNodeRow>) -> Result<Self, EngineError> {
        let trigger = parse_trigger(&row.trigger)?;
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            trigger,
            status: row.status,
            nodes: nodes.into_iter().map(WorkflowNode::from_row).collect(),
        })
    }

    /// Load a workflow and its nodes from the store.
    pub async fn load(store: &dyn Store, id: Uuid) -> Result<Self, EngineError> {
        let row = store.get_workflow(id).await?;
        let nodes = store.list_workflow_nodes(id).await?;
        Self::from_rows(row, nodes)
    }
}

/// Decode a stored trigger document.
pub fn parse_trigger(value: &Value) -> Result<Trigger, EngineError> {
    serde_json::from_value(value.clone())
        .map_err(|e| EngineError::InvalidDefinition(format!("trigger {value}: {e}")))
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A workflow as authored: what the API accepts and `agentflow validate`
/// reads from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub project_id: Uuid,
    pub trigger: Trigger,
    #[serde(default = "default_status")]
    pub status: WorkflowStatus,
    pub nodes: Vec<WorkflowNode>,
}

fn default_status() -> WorkflowStatus {
    WorkflowStatus::Draft
}

impl WorkflowDefinition {
    /// Check the trigger pattern and the node graph; returns the execution
    /// batches the scheduler would use.
    pub fn validate(&self) -> Result<Vec<Vec<String>>, EngineError> {
        if let Trigger::Event { pattern } = &self.trigger {
            bus::SubjectPattern::parse(pattern)?;
        }
        plan_batches(&self.nodes)
    }

    /// Validate, then persist the workflow and its nodes.
    pub async fn save(&self, store: &dyn Store) -> Result<Workflow, EngineError> {
        self.validate()?;

        let trigger = serde_json::to_value(&self.trigger)
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
        let row = store
            .create_workflow(NewWorkflow {
                project_id: self.project_id,
                name: self.name.clone(),
                trigger,
                status: self.status,
            })
            .await?;

        let mut node_rows = Vec::with_capacity(self.nodes.len());
        for (position, node) in self.nodes.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| EngineError::InvalidDefinition("too many nodes".into()))?;
            node_rows.push(store.insert_workflow_node(node.to_row(row.id, position)).await?);
        }

        Workflow::from_rows(row, node_rows)
    }
}
