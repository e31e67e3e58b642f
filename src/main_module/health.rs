//! Liveness and storage readiness

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let storage_ok = match state.repo.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check: storage unreachable: {e}");
            false
        }
    };

    let status = if storage_ok { "healthy" } else { "degraded" };
    let code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "cally",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage_ok
        })),
    )
}
