//! Health and audit trail endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::{authorize, ApiError, AppState};

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.db.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(serde_json::json!({
        "status": "ok",
        "service": "hotpatch-api",
        "database": database,
    }))
}

/// `GET /audit-logs` — latest entries, capped at 50 (bearer).
pub async fn audit_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let logs = state.audit.list(claims.app_id()).await;
    Ok(Json(logs))
}
