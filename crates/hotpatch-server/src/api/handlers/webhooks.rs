//! Webhook subscription endpoints (bearer token required).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::{authorize, ApiError, AppState};
use crate::services::CreateWebhookRequest;

/// `POST /webhooks` — the signing secret is only present in this response.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let created = state.webhooks.create(claims.app_id(), &req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /webhooks`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let webhooks = state.webhooks.list(claims.app_id()).await?;
    Ok(Json(webhooks))
}

/// `DELETE /webhooks/{id}`
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    state.webhooks.delete(claims.app_id(), &id).await?;
    Ok(Json(serde_json::json!({ "message": "Webhook deleted" })))
}
