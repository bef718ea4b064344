use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use db::models::{WorkflowRow, WorkflowRunRow};
use engine::{Workflow, WorkflowDefinition};

use super::AppState;
use crate::ApiError;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<WorkflowRow>>, ApiError> {
    Ok(Json(state.store.list_workflows().await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Workflow>, ApiError> {
    Ok(Json(Workflow::load(state.store.as_ref(), id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let workflow = definition.save(state.store.as_ref()).await?;
    info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRunDto {
    /// Becomes the run's immutable context.
    #[serde(default)]
    pub context: Value,
}

/// Start a manual run; execution continues in the background.
pub async fn start_run(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<StartRunDto>,
) -> Result<(StatusCode, Json<WorkflowRunRow>), ApiError> {
    let dispatched = state.matcher.start_manual_run(id, payload.context).await?;
    Ok((StatusCode::ACCEPTED, Json(dispatched.run)))
}

pub async fn list_runs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowRunRow>>, ApiError> {
    state.store.get_workflow(id).await?;
    Ok(Json(state.store.list_runs(id).await?))
}
