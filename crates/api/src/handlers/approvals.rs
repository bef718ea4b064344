use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use db::models::{ApprovalRow, ApprovalStatus};

use super::AppState;
use crate::ApiError;

pub async fn list_pending(State(state): State<AppState>) -> Result<Json<Vec<ApprovalRow>>, ApiError> {
    Ok(Json(state.store.list_pending_approvals().await?))
}

#[derive(Debug, Deserialize)]
pub struct DecisionDto {
    pub approved: bool,
    pub responded_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Record a reviewer's decision. The first decision wins; later ones get 409.
pub async fn decide(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<DecisionDto>,
) -> Result<Json<ApprovalRow>, ApiError> {
    if payload.responded_by.trim().is_empty() {
        return Err(ApiError::BadRequest("responded_by must not be empty".into()));
    }

    let decision = if payload.approved {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Rejected
    };

    let resolved = state
        .store
        .resolve_approval(id, decision, &payload.responded_by, payload.notes.as_deref())
        .await?;

    match resolved {
        Some(approval) => {
            info!(approval_id = %id, %decision, responded_by = %payload.responded_by, "approval decided");
            Ok(Json(approval))
        }
        None => Err(ApiError::Conflict(format!("approval {id} was already decided"))),
    }
}
