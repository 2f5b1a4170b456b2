//! Router construction and shared application state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::audit::AuditRecorder;
use crate::auth::JwtManager;
use crate::cache::CacheLayer;
use crate::objectstore::ObjectStore;
use crate::ratelimit::RateLimiter;
use crate::services::{
    AppService, ChannelService, DeviceService, ReleaseService, ServiceError, UpdateService,
    WebhookService,
};
use crate::storage::Database;
use crate::webhooks::WebhookDispatcher;

use super::handlers;
use super::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: JwtManager,
    pub updates: UpdateService,
    pub releases: ReleaseService,
    pub devices: DeviceService,
    pub channels: ChannelService,
    pub apps: AppService,
    pub webhooks: WebhookService,
    pub audit: AuditRecorder,
    pub sdk_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire up all services over the given backends.
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        cache: Option<Arc<dyn CacheLayer>>,
        jwt: JwtManager,
        sdk_rate_limit: u64,
    ) -> Self {
        let audit = AuditRecorder::new(db.clone());
        let dispatcher = WebhookDispatcher::new(db.clone());
        let channels = ChannelService::new(db.clone());
        let sdk_limiter = Arc::new(RateLimiter::new(
            sdk_rate_limit,
            Duration::from_secs(60),
            cache.clone(),
        ));

        Self {
            updates: UpdateService::new(db.clone(), cache.clone()),
            releases: ReleaseService::new(
                db.clone(),
                store,
                cache,
                dispatcher,
                audit.clone(),
            ),
            devices: DeviceService::new(db.clone()),
            apps: AppService::new(db.clone(), channels.clone(), jwt.clone(), audit.clone()),
            webhooks: WebhookService::new(db.clone(), audit.clone()),
            channels,
            audit,
            jwt,
            db,
            sdk_limiter,
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // SDK routes: app-key-less, rate-limited per client IP
    let sdk = Router::new()
        .route(
            "/update/check",
            get(handlers::update::check_query).post(handlers::update::check_body),
        )
        .route("/devices", post(handlers::devices::register))
        .route("/installations", post(handlers::devices::report_installation))
        .layer(middleware::from_fn_with_state(state.clone(), sdk_rate_limit));

    // Publication and management routes: bearer token checked per handler
    let api = Router::new()
        .route("/releases", post(handlers::releases::create).get(handlers::releases::list))
        .route(
            "/releases/{id}",
            get(handlers::releases::get_by_id).delete(handlers::releases::archive),
        )
        .route("/releases/{id}/rollback", patch(handlers::releases::rollback))
        .route("/releases/{id}/rollout", patch(handlers::releases::update_rollout))
        .route("/releases/{id}/patches", post(handlers::releases::add_patch))
        .route("/releases/{id}/stats", get(handlers::releases::stats))
        .route("/devices", get(handlers::devices::list))
        .route("/channels", post(handlers::channels::create).get(handlers::channels::list))
        .route(
            "/channels/{slug}",
            get(handlers::channels::get)
                .patch(handlers::channels::update)
                .delete(handlers::channels::delete),
        )
        .route("/webhooks", post(handlers::webhooks::create).get(handlers::webhooks::list))
        .route("/webhooks/{id}", delete(handlers::webhooks::delete))
        .route("/audit-logs", get(handlers::system::audit_logs));

    Router::new()
        .route("/health", get(handlers::system::health))
        .route("/apps", post(handlers::apps::register))
        .route("/auth/token", post(handlers::apps::token))
        .merge(sdk)
        .merge(api)
        .with_state(state)
}

/// Per-client-IP admission gate for the SDK routes.
async fn sdk_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_ip(&req);
    if !state.sdk_limiter.allow(&key).await {
        return ApiError::from(ServiceError::RateLimited).into_response();
    }
    next.run(req).await
}

/// Client IP from `X-Forwarded-For` (proxy deployments) or the socket address.
fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}
