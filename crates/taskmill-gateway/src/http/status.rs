//! Status projection endpoint — GET /status?task_id=<uuid>.
//!
//! Read-only view of a task's lifecycle. Unset timestamps are omitted from
//! the response rather than serialised as sentinels.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::app::AppState;
use taskmill_store::{StoreError, Task, TaskState};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub command: String,
    pub state: TaskState,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Task> for StatusResponse {
    fn from(task: Task) -> Self {
        let state = task.state();
        Self {
            task_id: task.id,
            command: task.command,
            state,
            scheduled_at: task.scheduled_at,
            picked_at: task.picked_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            failed_at: task.failed_at,
            error: task.error,
        }
    }
}

/// GET /status?task_id=<id>
///
/// 400 for a missing or malformed id, 404 for an unknown id, 500 on store
/// failure.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<Value>)> {
    let task_id = query.task_id.as_deref().unwrap_or("");
    if task_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "task_id is required"})),
        ));
    }

    let task = state.store.get(task_id).map_err(|e| match e {
        StoreError::InvalidId(id) => {
            warn!(task_id = %id, "malformed task id");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "task_id must be a UUID"})),
            )
        }
        StoreError::TaskNotFound { id } => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("no task with id: {id}")})),
        ),
        other => {
            error!(error = %other, "status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            )
        }
    })?;

    Ok(Json(StatusResponse::from(task)))
}
