//! Device registration and installation reporting endpoints.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::{authorize, ApiError, AppState};
use crate::services::{RegisterDeviceRequest, ReportInstallationRequest};

/// `POST /devices` — SDK device upsert.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = state.devices.register_or_update(&req).await?;
    Ok(Json(device))
}

/// `POST /installations` — SDK installation outcome report.
pub async fn report_installation(
    State(state): State<AppState>,
    Json(req): Json<ReportInstallationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let installation = state.devices.report_installation(&req).await?;
    Ok((StatusCode::CREATED, Json(installation)))
}

#[derive(Deserialize)]
pub struct ListDevicesQuery {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    per_page: Option<u32>,
}

/// `GET /devices` — dashboard device listing (bearer).
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListDevicesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let page = state
        .devices
        .list(claims.app_id(), query.page, query.per_page)
        .await?;
    Ok(Json(page))
}
