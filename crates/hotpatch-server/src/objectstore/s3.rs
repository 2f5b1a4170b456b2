//! S3-compatible object storage backend.
//!
//! Talks directly to the S3 REST API with SigV4 signing and path-style
//! addressing, which keeps it compatible with AWS S3, Cloudflare R2, and
//! MinIO alike. Credentials and endpoint are injected via [`S3Config`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use hotpatch_core::config::S3Config;

use super::sigv4::{
    authorization_header, presign_signature, sha256_hex, uri_encode, Credentials, SigningRequest,
    UNSIGNED_PAYLOAD,
};
use super::{ObjectStore, ObjectStoreError};

pub struct S3ObjectStore {
    http: reqwest::Client,
    bucket: String,
    region: String,
    /// Endpoint without a trailing slash, scheme included.
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl S3ObjectStore {
    pub fn new(cfg: &S3Config) -> Result<Self, ObjectStoreError> {
        let endpoint = if cfg.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", cfg.region)
        } else {
            cfg.endpoint.trim_end_matches('/').to_string()
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        debug!(endpoint = %endpoint, bucket = %cfg.bucket, "S3 object store initialized");

        Ok(Self {
            http,
            bucket: cfg.bucket.clone(),
            region: cfg.region.clone(),
            endpoint,
            access_key: cfg.access_key.clone(),
            secret_key: cfg.secret_key.clone(),
        })
    }

    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            region: &self.region,
            service: "s3",
        }
    }

    /// Host portion of the endpoint, for the signed `host` header.
    fn host(&self) -> &str {
        self.endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }

    /// Path-style URI path for an object: `/{bucket}/{key}`.
    fn object_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.endpoint, uri_encode(&self.object_path(key), false))
    }

    async fn signed_request(
        &self,
        method: reqwest::Method,
        key: &str,
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<(), ObjectStoreError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = match &body {
            Some((bytes, _)) => sha256_hex(bytes),
            None => sha256_hex(b""),
        };

        let path = self.object_path(key);
        let mut headers = vec![
            ("host".to_string(), self.host().to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some((_, content_type)) = &body {
            headers.push(("content-type".to_string(), (*content_type).to_string()));
        }

        let req = SigningRequest {
            method: method.as_str(),
            uri_path: &path,
            query: Vec::new(),
            headers,
            payload_hash: &payload_hash,
        };
        let authorization = authorization_header(&self.credentials(), &amz_date, &req)?;

        let mut builder = self
            .http
            .request(method, self.object_url(key))
            .header("authorization", authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);
        if let Some((bytes, content_type)) = body {
            builder = builder.header("content-type", content_type).body(bytes);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        warn!(status = status.as_u16(), key = %key, "S3 request failed");
        Err(ObjectStoreError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.signed_request(reqwest::Method::PUT, key, Some((bytes, content_type)))
            .await
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &amz_date[..8];

        let credential = format!(
            "{}/{date}/{}/s3/aws4_request",
            self.access_key, self.region
        );
        let path = self.object_path(key);
        let query = vec![
            (
                "X-Amz-Algorithm".to_string(),
                "AWS4-HMAC-SHA256".to_string(),
            ),
            ("X-Amz-Credential".to_string(), uri_encode(&credential, true)),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), ttl.as_secs().to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];

        let req = SigningRequest {
            method: "GET",
            uri_path: &path,
            query: query.clone(),
            headers: vec![("host".to_string(), self.host().to_string())],
            payload_hash: UNSIGNED_PAYLOAD,
        };
        let signature = presign_signature(&self.credentials(), &amz_date, &req)?;

        let query_string: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        Ok(format!(
            "{}?{}&X-Amz-Signature={signature}",
            self.object_url(key),
            query_string.join("&"),
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.signed_request(reqwest::Method::DELETE, key, None).await
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_store() -> S3ObjectStore {
        S3ObjectStore::new(&S3Config {
            bucket: "hotpatch-bundles".to_string(),
            endpoint: "http://localhost:9000".to_string(),
            region: "auto".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn path_style_object_url() {
        let store = test_store();
        assert_eq!(
            store.object_url("bundles/app-1/android/production/1.0.0.zip"),
            "http://localhost:9000/hotpatch-bundles/bundles/app-1/android/production/1.0.0.zip"
        );
    }

    #[test]
    fn host_strips_scheme() {
        let store = test_store();
        assert_eq!(store.host(), "localhost:9000");
    }

    #[test]
    fn default_endpoint_is_regional_aws() {
        let store = S3ObjectStore::new(&S3Config {
            bucket: "b".to_string(),
            endpoint: String::new(),
            region: "eu-west-1".to_string(),
            access_key: "k".to_string(),
            secret_key: "s".to_string(),
        })
        .unwrap();
        assert_eq!(store.endpoint, "https://s3.eu-west-1.amazonaws.com");
    }

    #[tokio::test]
    async fn presigned_url_carries_sigv4_query() {
        let store = test_store();
        let url = store
            .presign("bundles/app/1.0.0.zip", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with(
            "http://localhost:9000/hotpatch-bundles/bundles/app/1.0.0.zip?X-Amz-Algorithm=AWS4-HMAC-SHA256"
        ));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
