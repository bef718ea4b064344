//! Workflow-run and agent-run repository functions.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{AgentRunRow, NewAgentRun, RunStatus, WorkflowRunRow},
    DbError,
};

const RUN_COLUMNS: &str = "id, workflow_id, trigger, context, status, error, started_at, finished_at";
const AGENT_RUN_COLUMNS: &str =
    "id, agent_id, workflow_run_id, node_id, input, output, status, error, duration_ms, finished_at";

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Create a new workflow run record in `PENDING` status.
pub async fn create_run(
    pool: &PgPool,
    workflow_id: Uuid,
    trigger: &str,
    context: Value,
) -> Result<WorkflowRunRow, DbError> {
    let sql = format!(
        "INSERT INTO workflow_runs (id, workflow_id, trigger, context, status, started_at) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(workflow_id)
        .bind(trigger)
        .bind(context)
        .bind(RunStatus::Pending)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<WorkflowRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1");
    sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Runs of one workflow, newest first.
pub async fn list_runs(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<WorkflowRunRow>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE workflow_id = $1 ORDER BY started_at DESC"
    );
    let rows = sqlx::query_as::<_, WorkflowRunRow>(&sql)
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Compare-and-set the run status in a single statement.
pub async fn transition_run(
    pool: &PgPool,
    id: Uuid,
    from: &[RunStatus],
    to: RunStatus,
    error: Option<&str>,
) -> Result<bool, DbError> {
    let from: Vec<&'static str> = from.iter().map(|s| s.as_str()).collect();
    let finished_at = to.is_terminal().then(Utc::now);

    let result = sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status      = $1,
            error       = COALESCE($2, error),
            finished_at = COALESCE($3, finished_at)
        WHERE id = $4 AND status = ANY($5)
        "#,
    )
    .bind(to)
    .bind(error)
    .bind(finished_at)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

// ---------------------------------------------------------------------------
// agent_runs
// ---------------------------------------------------------------------------

/// Insert a completed node execution record.
pub async fn insert_agent_run(pool: &PgPool, new: NewAgentRun) -> Result<AgentRunRow, DbError> {
    let sql = format!(
        "INSERT INTO agent_runs ({AGENT_RUN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {AGENT_RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AgentRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(new.agent_id)
        .bind(new.workflow_run_id)
        .bind(&new.node_id)
        .bind(&new.input)
        .bind(&new.output)
        .bind(new.status)
        .bind(&new.error)
        .bind(new.duration_ms)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

pub async fn list_agent_runs(
    pool: &PgPool,
    workflow_run_id: Uuid,
) -> Result<Vec<AgentRunRow>, DbError> {
    let sql = format!(
        "SELECT {AGENT_RUN_COLUMNS} FROM agent_runs WHERE workflow_run_id = $1 ORDER BY finished_at ASC"
    );
    let rows = sqlx::query_as::<_, AgentRunRow>(&sql)
        .bind(workflow_run_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
