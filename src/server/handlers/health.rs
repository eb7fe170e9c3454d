use crate::server::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Liveness endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_tokens": state.tokens.len(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus exposition endpoint
pub async fn metrics_export(State(state): State<AppState>) -> Response {
    match state.metrics_handle {
        Some(ref handle) => (StatusCode::OK, handle.render()).into_response(),
        // Another instance in this process owns the global recorder
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder unavailable").into_response(),
    }
}
