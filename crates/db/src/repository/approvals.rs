//! Approval repository functions.
//!
//! Decisions are written with `… WHERE status = 'PENDING'` so the first
//! writer (a reviewer or the gate's timeout) wins and later writers observe
//! zero affected rows.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{ApprovalRow, ApprovalStatus},
    DbError,
};

const APPROVAL_COLUMNS: &str =
    "id, workflow_run_id, node_id, status, requested_at, responded_at, responded_by, notes";

pub async fn create_approval(
    pool: &PgPool,
    workflow_run_id: Uuid,
    node_id: &str,
) -> Result<ApprovalRow, DbError> {
    let sql = format!(
        "INSERT INTO workflow_approvals (id, workflow_run_id, node_id, status, requested_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {APPROVAL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ApprovalRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(workflow_run_id)
        .bind(node_id)
        .bind(ApprovalStatus::Pending)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

pub async fn get_approval(pool: &PgPool, id: Uuid) -> Result<ApprovalRow, DbError> {
    let sql = format!("SELECT {APPROVAL_COLUMNS} FROM workflow_approvals WHERE id = $1");
    sqlx::query_as::<_, ApprovalRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Pending approvals, oldest request first.
pub async fn list_pending_approvals(pool: &PgPool) -> Result<Vec<ApprovalRow>, DbError> {
    let sql = format!(
        "SELECT {APPROVAL_COLUMNS} FROM workflow_approvals \
         WHERE status = 'PENDING' ORDER BY requested_at ASC"
    );
    let rows = sqlx::query_as::<_, ApprovalRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Decide a pending approval. `None` means it was already decided.
pub async fn resolve_approval(
    pool: &PgPool,
    id: Uuid,
    decision: ApprovalStatus,
    responded_by: &str,
    notes: Option<&str>,
) -> Result<Option<ApprovalRow>, DbError> {
    if decision == ApprovalStatus::Pending {
        return Err(DbError::InvalidDecision(decision.to_string()));
    }

    let sql = format!(
        "UPDATE workflow_approvals \
         SET status = $1, responded_at = $2, responded_by = $3, notes = $4 \
         WHERE id = $5 AND status = 'PENDING' \
         RETURNING {APPROVAL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ApprovalRow>(&sql)
        .bind(decision)
        .bind(Utc::now())
        .bind(responded_by)
        .bind(notes)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if row.is_none() {
        // Distinguish "already decided" from "no such approval".
        get_approval(pool, id).await?;
    }

    Ok(row)
}

/// Reject every PENDING approval of a run in one statement.
pub async fn reject_pending_approvals(
    pool: &PgPool,
    workflow_run_id: Uuid,
    responded_by: &str,
    notes: Option<&str>,
) -> Result<Vec<ApprovalRow>, DbError> {
    let sql = format!(
        "UPDATE workflow_approvals \
         SET status = $1, responded_at = $2, responded_by = $3, notes = $4 \
         WHERE workflow_run_id = $5 AND status = 'PENDING' \
         RETURNING {APPROVAL_COLUMNS}"
    );
    let rows = sqlx::query_as::<_, ApprovalRow>(&sql)
        .bind(ApprovalStatus::Rejected)
        .bind(Utc::now())
        .bind(responded_by)
        .bind(notes)
        .bind(workflow_run_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
