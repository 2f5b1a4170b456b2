//! HotPatch OTA Update Server
//!
//! HTTP backend answering SDK update checks and serving the release
//! publication pipeline.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use hotpatch_core::{tracing_init, Config};
use hotpatch_server::api::{build_router, AppState};
use hotpatch_server::auth::JwtManager;
use hotpatch_server::cache::{CacheLayer, MemoryCache};
use hotpatch_server::objectstore::{FsObjectStore, ObjectStore, S3ObjectStore};
use hotpatch_server::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "hotpatch-server")]
#[command(version, about = "HotPatch OTA update server")]
struct Args {
    /// Address to listen on (defaults to 0.0.0.0 on the configured port).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to the SQLite database file (overrides DATABASE_PATH).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_init::init_tracing("hotpatch_server=info", args.log_json);

    let config = Config::from_env()?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting hotpatch-server");

    let db_path = args
        .db_path
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| PathBuf::from("data/hotpatch.db"));
    let db = Database::open(&db_path).await?;

    let addr = args
        .addr
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], config.port)));

    let store: Arc<dyn ObjectStore> = if config.has_s3() {
        info!(bucket = %config.s3.bucket, "Using S3 object storage");
        Arc::new(S3ObjectStore::new(&config.s3)?)
    } else {
        let blob_dir = config
            .blob_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data/blobs"));
        warn!(dir = %blob_dir.display(), "No S3 credentials configured, using local blob store");
        Arc::new(FsObjectStore::new(
            blob_dir,
            format!("http://{addr}/blobs"),
        ))
    };

    let cache: Option<Arc<dyn CacheLayer>> = if config.cache_disabled {
        None
    } else {
        Some(Arc::new(MemoryCache::new()))
    };

    let jwt = JwtManager::new(
        config.jwt_secret.as_bytes(),
        config.jwt_expiration_hours * 3600,
    );

    let state = AppState::new(db, store, cache, jwt, config.sdk_rate_limit);
    state.sdk_limiter.spawn_sweeper();

    let app = build_router(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    info!(addr = %addr, "hotpatch-server ready");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
