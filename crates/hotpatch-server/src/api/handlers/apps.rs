//! App registration and token exchange endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::{ApiError, AppState};
use crate::services::RegisterAppRequest;

/// `POST /apps` — registration flow; the raw CLI key appears in this
/// response and nowhere else.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterAppRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registered = state.apps.register(&req).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    app_id: String,
    api_key: String,
}

/// `POST /auth/token` — exchange a CLI key for a bearer token.
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.apps.issue_token(&req.app_id, &req.api_key).await?;
    Ok(Json(token))
}
