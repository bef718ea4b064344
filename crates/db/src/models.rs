//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types (typed triggers, node graphs) live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Disabled,
}

/// Possible statuses for a workflow run.
///
/// PENDING → RUNNING is the only entry; RUNNING and WAITING_APPROVAL may
/// alternate; SUCCESS and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    WaitingApproval,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::WaitingApproval => "WAITING_APPROVAL",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING"          => Ok(Self::Pending),
            "RUNNING"          => Ok(Self::Running),
            "WAITING_APPROVAL" => Ok(Self::WaitingApproval),
            "SUCCESS"          => Ok(Self::Success),
            "FAILED"           => Ok(Self::Failed),
            other              => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Outcome of one node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRunStatus {
    Success,
    Failed,
}

/// State of a human sign-off request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending  => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Declared risk of a node or capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

// ---------------------------------------------------------------------------
// workflows / workflow_nodes
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    /// `{"type":"manual"}` or `{"type":"event","pattern":"…"}`
    pub trigger: serde_json::Value,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub project_id: Uuid,
    pub name: String,
    pub trigger: serde_json::Value,
    pub status: WorkflowStatus,
}

/// A persisted workflow node row. `id` is unique within its workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowNodeRow {
    pub id: String,
    pub workflow_id: Uuid,
    pub agent_id: Uuid,
    pub action: String,
    pub inputs_template: serde_json::Value,
    pub depends_on: Vec<String>,
    pub approval_required: bool,
    pub risk_level: RiskLevel,
    /// Declaration order within the workflow.
    pub position: i32,
}

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// A persisted workflow run row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Provenance, e.g. `event:graph.file.updated` or `manual`.
    pub trigger: String,
    pub context: serde_json::Value,
    pub status: RunStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// agent_runs
// ---------------------------------------------------------------------------

/// A persisted node execution row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentRunRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub workflow_run_id: Uuid,
    pub node_id: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: AgentRunStatus,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub finished_at: DateTime<Utc>,
}

/// Fields supplied when recording a node execution.
#[derive(Debug, Clone)]
pub struct NewAgentRun {
    pub agent_id: Uuid,
    pub workflow_run_id: Uuid,
    pub node_id: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: AgentRunStatus,
    pub error: Option<String>,
    pub duration_ms: i64,
}

// ---------------------------------------------------------------------------
// workflow_approvals
// ---------------------------------------------------------------------------

/// A persisted approval request row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRow {
    pub id: Uuid,
    pub workflow_run_id: Uuid,
    pub node_id: String,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// agent_capabilities
// ---------------------------------------------------------------------------

/// An agent capability as published by the external registry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CapabilityRow {
    pub agent_id: Uuid,
    pub agent_name: String,
    /// What the execution backend runs, e.g. a module path or image ref.
    pub entry_reference: String,
    pub action: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    pub risk_level: RiskLevel,
}
