//! Channel management endpoints (bearer token required).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::{authorize, ApiError, AppState};
use crate::services::{CreateChannelRequest, UpdateChannelRequest};

/// `POST /channels`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let channel = state.channels.create(claims.app_id(), &req).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// `GET /channels`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let channels = state.channels.list(claims.app_id()).await?;
    Ok(Json(channels))
}

/// `GET /channels/{slug}`
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let channel = state.channels.get(claims.app_id(), &slug).await?;
    Ok(Json(channel))
}

/// `PATCH /channels/{slug}`
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let channel = state.channels.update(claims.app_id(), &slug, &req).await?;
    Ok(Json(channel))
}

/// `DELETE /channels/{slug}`
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    state.channels.delete(claims.app_id(), &slug).await?;
    Ok(Json(serde_json::json!({ "message": "Channel deleted" })))
}
