//! src/services/storage.rs
//!
//! StorageGateway is the narrow slice of an object store the batch pipeline
//! needs. It can stat an object and presign direct GET/PUT URLs for it. The S3
//! implementation is backed by `object_store`; signing only computes a URL
//! and never touches the object itself.

use async_trait::async_trait;
use axum::http::Method;
use object_store::{
    ObjectStore,
    aws::{AmazonS3, AmazonS3Builder},
    path::Path as ObjectPath,
    signer::Signer,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("storage lookup for `{key}` failed: {source}")]
    Backend {
        key: String,
        #[source]
        source: object_store::Error,
    },
    #[error("object `{key}` reports invalid size {size}")]
    InvalidSize { key: String, size: u64 },
    #[error("could not presign `{key}`: {reason}")]
    Presign { key: String, reason: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object-store capabilities consumed by the resolver.
///
/// Keys are full object keys (prefix already applied). Implementations are
/// shared across requests and must be safe to call concurrently.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Size of the stored object, `Ok(None)` when it does not exist.
    async fn stat(&self, key: &str) -> StorageResult<Option<i64>>;

    /// Presigned URL granting GET access to `key` for `ttl`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Presigned URL granting a single PUT to `key` for `ttl`.
    async fn presign_put(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Endpoint URL including scheme, e.g. `https://s3.us-east-1.amazonaws.com`.
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub allow_http: bool,
    /// Endpoint already names the bucket (virtual-hosted style).
    pub virtual_hosted: bool,
}

/// StorageGateway over an S3-compatible bucket.
pub struct S3Gateway {
    store: AmazonS3,
    bucket: String,
}

impl S3Gateway {
    pub fn new(settings: &S3Settings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_endpoint(&settings.endpoint)
            .with_access_key_id(&settings.access_key_id)
            .with_secret_access_key(&settings.secret_access_key)
            .with_allow_http(settings.allow_http)
            .with_virtual_hosted_style_request(settings.virtual_hosted);
        if let Some(token) = &settings.session_token {
            builder = builder.with_token(token);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        debug!(
            bucket = %settings.bucket,
            endpoint = %settings.endpoint,
            region = %settings.region,
            "Created S3 gateway"
        );

        Ok(Self {
            store,
            bucket: settings.bucket.clone(),
        })
    }

    async fn presign(&self, method: Method, key: &str, ttl: Duration) -> StorageResult<String> {
        let url = self
            .store
            .signed_url(method, &ObjectPath::from(key), ttl)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    async fn stat(&self, key: &str) -> StorageResult<Option<i64>> {
        match self.store.head(&ObjectPath::from(key)).await {
            Ok(meta) => {
                let size = i64::try_from(meta.size).map_err(|_| StorageError::InvalidSize {
                    key: key.to_string(),
                    size: meta.size as u64,
                })?;
                debug!(bucket = %self.bucket, key, size, "stat hit");
                Ok(Some(size))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(source) => Err(StorageError::Backend {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign(Method::GET, key, ttl).await
    }

    async fn presign_put(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign(Method::PUT, key, ttl).await
    }
}
