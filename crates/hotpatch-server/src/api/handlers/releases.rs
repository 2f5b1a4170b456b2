//! Release management endpoints (bearer token required).

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::error::bad_request;
use crate::api::{authorize, ApiError, AppState};
use crate::services::{ListReleasesQuery, PatchMetadata, PublishRequest};

/// Pull the `metadata` JSON field and a named file field out of a multipart
/// upload.
async fn read_multipart(
    multipart: &mut Multipart,
    file_field: &str,
) -> Result<(String, Vec<u8>), ApiError> {
    let mut metadata: Option<String> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("unreadable metadata field: {e}")))?;
                metadata = Some(text);
            }
            Some(name) if name == file_field => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("unreadable {file_field} field: {e}")))?;
                file = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let metadata = metadata.ok_or_else(|| bad_request("metadata field is required"))?;
    let file = file.ok_or_else(|| bad_request(format!("{file_field} file is required")))?;
    Ok((metadata, file))
}

/// `POST /releases` — multipart with `metadata` JSON and a `bundle` file.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;

    let (metadata, bundle) = read_multipart(&mut multipart, "bundle").await?;
    let req: PublishRequest = serde_json::from_str(&metadata)
        .map_err(|e| bad_request(format!("invalid metadata JSON: {e}")))?;

    let release = state.releases.publish(claims.app_id(), &req, bundle).await?;
    Ok((StatusCode::CREATED, Json(release)))
}

/// `GET /releases?channel=&is_active=&page=&per_page=`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListReleasesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authorize(&state, &headers)?;
    let page = state.releases.list(claims.app_id(), &query).await?;
    Ok(Json(page))
}

/// `GET /releases/{id}`
pub async fn get_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    let release = state.releases.get(&id).await?;
    Ok(Json(release))
}

/// `PATCH /releases/{id}/rollback`
pub async fn rollback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    let release = state.releases.rollback(&id).await?;
    Ok(Json(serde_json::json!({
        "message": "Rollback successful",
        "release": release,
    })))
}

#[derive(Deserialize)]
pub struct UpdateRolloutRequest {
    rollout_percentage: i64,
}

/// `PATCH /releases/{id}/rollout`
pub async fn update_rollout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateRolloutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    state
        .releases
        .update_rollout(&id, req.rollout_percentage)
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Rollout updated",
        "rollout_percentage": req.rollout_percentage,
    })))
}

/// `DELETE /releases/{id}` — archive (soft delete).
pub async fn archive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    state.releases.archive(&id).await?;
    Ok(Json(serde_json::json!({ "message": "Release archived" })))
}

/// `POST /releases/{id}/patches` — multipart with `metadata` and a `patch` file.
pub async fn add_patch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;

    let (metadata, patch_bytes) = read_multipart(&mut multipart, "patch").await?;
    let meta: PatchMetadata = serde_json::from_str(&metadata)
        .map_err(|e| bad_request(format!("invalid metadata JSON: {e}")))?;

    let patch = state.releases.attach_patch(&id, &meta, patch_bytes).await?;
    Ok((StatusCode::CREATED, Json(patch)))
}

/// `GET /releases/{id}/stats` — installation counts grouped by status.
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    let stats = state.devices.installation_stats(&id).await?;
    Ok(Json(stats))
}
