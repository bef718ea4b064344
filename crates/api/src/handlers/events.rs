use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use bus::Event;

use super::AppState;
use crate::ApiError;

/// Publish an event onto the bus, where the trigger matcher picks it up.
pub async fn publish(
    State(state): State<AppState>,
    Json(mut event): Json<Event>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    event.timestamp.get_or_insert_with(Utc::now);
    debug!(subject = %event.subject, "event received over http");

    let subject = event.subject.clone();
    state.bus.publish(event).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": subject }))))
}
