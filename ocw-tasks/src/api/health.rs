//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Task types with a registered result processor
    pub task_types: Vec<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "ocw-tasks".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        task_types: state.task_types.clone(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
