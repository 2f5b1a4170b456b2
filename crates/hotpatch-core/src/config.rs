//! Configuration for the HotPatch server.
//!
//! All settings come from environment variables with sensible defaults,
//! so the binary runs unconfigured in development and picks up production
//! settings from the deployment environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Complete HotPatch server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port for the HTTP API.
    pub port: u16,

    /// Path to the SQLite database file.
    pub database_path: Option<PathBuf>,

    /// Secret used to sign bearer tokens (min 32 characters).
    pub jwt_secret: String,

    /// Bearer token lifetime in hours.
    pub jwt_expiration_hours: i64,

    /// Object storage settings. When no access key is configured the server
    /// falls back to a local filesystem blob store under `blob_dir`.
    pub s3: S3Config,

    /// Directory for the local blob store fallback.
    pub blob_dir: Option<PathBuf>,

    /// Requests per minute allowed per client on SDK endpoints.
    pub sdk_rate_limit: u64,

    /// Disable the in-process release cache (reads always hit the database).
    pub cache_disabled: bool,
}

/// S3-compatible object storage settings (AWS S3, Cloudflare R2, MinIO).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores; empty means AWS.
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: None,
            jwt_secret: String::new(),
            jwt_expiration_hours: 72,
            s3: S3Config {
                bucket: "hotpatch-bundles".to_string(),
                endpoint: String::new(),
                region: "auto".to_string(),
                access_key: String::new(),
                secret_key: String::new(),
            },
            blob_dir: None,
            sdk_rate_limit: 60,
            cache_disabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("PORT") {
            cfg.port = v
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a number: {v}")))?;
        }
        if let Ok(v) = std::env::var("DATABASE_PATH") {
            cfg.database_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            cfg.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("JWT_EXPIRATION_HOURS") {
            if let Ok(n) = v.parse() {
                cfg.jwt_expiration_hours = n;
            }
        }
        if let Ok(v) = std::env::var("S3_BUCKET") {
            cfg.s3.bucket = v;
        }
        if let Ok(v) = std::env::var("S3_ENDPOINT") {
            cfg.s3.endpoint = v;
        }
        if let Ok(v) = std::env::var("S3_REGION") {
            cfg.s3.region = v;
        }
        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            cfg.s3.access_key = v;
        }
        if let Ok(v) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            cfg.s3.secret_key = v;
        }
        if let Ok(v) = std::env::var("BLOB_DIR") {
            cfg.blob_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("SDK_RATE_LIMIT") {
            if let Ok(n) = v.parse() {
                cfg.sdk_rate_limit = n;
            }
        }
        if let Ok(v) = std::env::var("CACHE_DISABLED") {
            cfg.cache_disabled = v == "1" || v.eq_ignore_ascii_case("true");
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate invariants that would otherwise surface as runtime auth bugs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "JWT_SECRET is required (min 32 characters)".to_string(),
            ));
        }
        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }
        if self.sdk_rate_limit == 0 {
            return Err(ConfigError::Invalid(
                "SDK_RATE_LIMIT must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether S3 credentials are configured; otherwise the local blob store
    /// fallback is used.
    pub fn has_s3(&self) -> bool {
        !self.s3.access_key.is_empty() && !self.s3.secret_key.is_empty()
    }
}
