use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use db::models::{AgentRunRow, WorkflowRunRow};

use super::AppState;
use crate::ApiError;

/// A run together with the node executions recorded so far.
#[derive(Debug, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: WorkflowRunRow,
    pub agent_runs: Vec<AgentRunRow>,
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<RunView>, ApiError> {
    let run = state.store.get_run(id).await?;
    let agent_runs = state.store.list_agent_runs(id).await?;
    Ok(Json(RunView { run, agent_runs }))
}
