//! Workflow and workflow-node operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NewWorkflow, WorkflowNodeRow, WorkflowRow},
    DbError,
};

const WORKFLOW_COLUMNS: &str = "id, project_id, name, trigger, status, created_at";
const NODE_COLUMNS: &str =
    "id, workflow_id, agent_id, action, inputs_template, depends_on, approval_required, risk_level, position";

/// Insert a new workflow into the database.
pub async fn create_workflow(pool: &PgPool, new: NewWorkflow) -> Result<WorkflowRow, DbError> {
    let sql = format!(
        "INSERT INTO workflows ({WORKFLOW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {WORKFLOW_COLUMNS}"
    );
    let row = sqlx::query_as::<_, WorkflowRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(new.project_id)
        .bind(&new.name)
        .bind(&new.trigger)
        .bind(new.status)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1");
    sqlx::query_as::<_, WorkflowRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, WorkflowRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// ACTIVE workflows with an event trigger.
pub async fn list_active_event_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let sql = format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows \
         WHERE status = 'ACTIVE' AND trigger->>'type' = 'event' \
         ORDER BY created_at ASC"
    );
    let rows = sqlx::query_as::<_, WorkflowRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn insert_workflow_node(
    pool: &PgPool,
    node: WorkflowNodeRow,
) -> Result<WorkflowNodeRow, DbError> {
    let sql = format!(
        "INSERT INTO workflow_nodes ({NODE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {NODE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, WorkflowNodeRow>(&sql)
        .bind(&node.id)
        .bind(node.workflow_id)
        .bind(node.agent_id)
        .bind(&node.action)
        .bind(&node.inputs_template)
        .bind(&node.depends_on)
        .bind(node.approval_required)
        .bind(node.risk_level)
        .bind(node.position)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Nodes of a workflow in declaration order.
pub async fn list_workflow_nodes(
    pool: &PgPool,
    workflow_id: Uuid,
) -> Result<Vec<WorkflowNodeRow>, DbError> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM workflow_nodes WHERE workflow_id = $1 ORDER BY position ASC"
    );
    let rows = sqlx::query_as::<_, WorkflowNodeRow>(&sql)
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
