//! The high-throughput update check endpoint.
//!
//! Called on every app launch. Target P99 latency: < 50ms.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::bad_request;
use crate::api::{ApiError, AppState};
use crate::services::{ServiceError, UpdateCheckRequest, UpdateCheckResponse};

/// Hard deadline for a single update check.
const CHECK_DEADLINE: Duration = Duration::from_secs(2);

/// `GET /update/check?appId&deviceId&version&platform&channel`
pub async fn check_query(
    State(state): State<AppState>,
    Query(req): Query<UpdateCheckRequest>,
) -> Result<Json<UpdateCheckResponse>, ApiError> {
    check(&state, &req).await
}

/// `POST /update/check` with the same fields as a JSON body.
pub async fn check_body(
    State(state): State<AppState>,
    Json(req): Json<UpdateCheckRequest>,
) -> Result<Json<UpdateCheckResponse>, ApiError> {
    check(&state, &req).await
}

async fn check(
    state: &AppState,
    req: &UpdateCheckRequest,
) -> Result<Json<UpdateCheckResponse>, ApiError> {
    if req.app_id.is_empty()
        || req.device_id.is_empty()
        || req.version.is_empty()
        || req.platform.is_empty()
        || req.channel.is_empty()
    {
        return Err(bad_request(
            "appId, deviceId, version, platform, and channel are all required",
        ));
    }

    let response = tokio::time::timeout(CHECK_DEADLINE, state.updates.check(req))
        .await
        .map_err(|_| ServiceError::Internal("update check timed out".to_string()))??;
    Ok(Json(response))
}
