use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let uptime = state.started_at.elapsed().as_secs();
    let now = chrono::Utc::now().to_rfc3339();

    match state.catalog.ping().await {
        Ok(()) => {
            tracing::debug!(uptime_secs = uptime, "health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": now,
                    "uptime_secs": uptime,
                    "database": "connected"
                })),
            )
        }
        Err(err) => {
            tracing::warn!(uptime_secs = uptime, error = %err, "health check degraded: database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": now,
                    "uptime_secs": uptime,
                    "database": "unreachable"
                })),
            )
        }
    }
}

pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
