//! Worker callback endpoint
//!
//! POST /api/workspaces/:workspace_id/transcripts/:transcript_id/taskStatuses/:task_id

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::json_body::JsonBody;
use crate::error::TaskResult;
use crate::models::{TargetKey, TaskStatus, TaskUpdate};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

pub async fn task_status_callback(
    State(state): State<AppState>,
    Path((workspace_id, transcript_id, task_id)): Path<(String, String, Uuid)>,
    JsonBody(update): JsonBody<TaskUpdate>,
) -> TaskResult<Json<CallbackResponse>> {
    let target = TargetKey::new(workspace_id, transcript_id);
    let task = state.tasks.apply_callback(&target, task_id, update).await?;

    Ok(Json(CallbackResponse {
        task_id: task.id,
        status: task.status,
    }))
}

/// Build worker callback routes
pub fn callback_routes() -> Router<AppState> {
    Router::new().route(
        "/api/workspaces/:workspace_id/transcripts/:transcript_id/taskStatuses/:task_id",
        post(task_status_callback),
    )
}
