//! Task submission endpoint — POST /schedule.
//!
//! Accepts `{command, scheduled_at}` and creates a task in `Scheduled`
//! state. The body is parsed by hand from bytes so malformed JSON and
//! missing fields surface as 400, not as the extractor's default rejection.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub command: String,
    pub scheduled_at: DateTime<Utc>,
}

/// POST /schedule
///
/// Returns 200 with `{task_id, command, scheduled_at}` on success, 400 on a
/// missing/empty command or unparseable body, 500 when the store is
/// unreachable.
pub async fn schedule_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let req: ScheduleRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid schedule request body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid request body: {e}")})),
        )
    })?;

    if req.command.trim().is_empty() {
        warn!("schedule request with empty command");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "command must not be empty"})),
        ));
    }

    info!(command = %req.command, scheduled_at = %req.scheduled_at, "schedule request");

    let task = state
        .store
        .insert(&req.command, req.scheduled_at)
        .map_err(|e| {
            error!(error = %e, "task insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to submit task"})),
            )
        })?;

    Ok(Json(json!({
        "task_id": task.id,
        "command": task.command,
        "scheduled_at": task.scheduled_at,
    })))
}
