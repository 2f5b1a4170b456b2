//! HTTP API boundary: routing, auth-claim extraction, error shaping.

mod error;
mod handlers;
pub mod routes;

pub use error::ApiError;
pub use routes::{build_router, AppState};

use axum::http::{header, HeaderMap};

use crate::auth::Claims;
use crate::services::ServiceError;

/// Extract and validate the bearer token from the `Authorization` header.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthenticated("missing bearer token"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthenticated("malformed authorization header"))?;

    state
        .jwt
        .validate(token)
        .map_err(|_| unauthenticated("invalid or expired token"))
}

fn unauthenticated(msg: &str) -> ApiError {
    ServiceError::Unauthenticated(msg.to_string()).into()
}
