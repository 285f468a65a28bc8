//! ObjectResolver: decides, for one requested object, which action (if any)
//! the client gets and which per-object error (if any) it sees.
//!
//! Resolution never fails as a whole: every outcome, including storage and
//! signer failures, is folded into the returned `BatchResponseObject`.

use crate::{
    models::{
        batch::{Action, Actions, BatchResponseObject, Operation},
        oid::is_valid_oid,
    },
    services::storage::{StorageError, StorageGateway},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Largest object a single unsigned S3 PUT accepts: 5 GB minus one byte.
pub const S3_SINGLE_PUT_LIMIT: i64 = 5 * 1_000_000_000 - 1;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

pub const INVALID_OID_MESSAGE: &str = "oid must be a SHA-256 hash in lower case hexadecimal";

/// Per-deployment knobs for resolution.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Prepended to every oid to form the storage key.
    pub prefix: String,
    /// Lifetime of minted URLs, reported back as `expires_in`.
    pub ttl: Duration,
    /// Uploads of new objects above this size are refused.
    pub max_upload_size: i64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            ttl: DEFAULT_TTL,
            max_upload_size: S3_SINGLE_PUT_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct ObjectResolver {
    gateway: Arc<dyn StorageGateway>,
    settings: ResolverSettings,
}

impl ObjectResolver {
    pub fn new(gateway: Arc<dyn StorageGateway>, settings: ResolverSettings) -> Self {
        Self { gateway, settings }
    }

    fn key(&self, oid: &str) -> String {
        format!("{}{}", self.settings.prefix, oid)
    }

    pub async fn resolve(&self, operation: Operation, oid: &str, size: i64) -> BatchResponseObject {
        let out = BatchResponseObject::echo(oid, size);

        if !is_valid_oid(oid) {
            return out.with_error(422, INVALID_OID_MESSAGE);
        }

        match operation {
            Operation::Download => self.resolve_download(out).await,
            Operation::Upload => self.resolve_upload(out).await,
            Operation::Unknown => out,
        }
    }

    async fn resolve_download(&self, mut out: BatchResponseObject) -> BatchResponseObject {
        let key = self.key(&out.oid);

        let lookup = self.gateway.stat(&key).await;
        let stored = match lookup {
            Ok(Some(stored)) => stored,
            Ok(None) => return out.with_error(404, StorageError::NotFound(key).to_string()),
            Err(err) => {
                debug!(key = %key, error = %err, "download lookup failed");
                return out.with_error(404, err.to_string());
            }
        };

        if stored != out.size {
            debug!(key = %key, requested = out.size, stored, "download size mismatch");
            out.size = stored;
            out = out.with_error(422, "found object with wrong size");
        }

        match self.gateway.presign_get(&key, self.settings.ttl).await {
            Ok(href) => {
                out.actions = Some(Actions::download(Action::expiring_in(
                    href,
                    self.settings.ttl,
                )));
                out
            }
            Err(err) => {
                warn!(key = %key, error = %err, "presigning download failed");
                out.with_error(500, format!("could not generate download URL: {err}"))
            }
        }
    }

    async fn resolve_upload(&self, out: BatchResponseObject) -> BatchResponseObject {
        let key = self.key(&out.oid);

        match self.gateway.stat(&key).await {
            Ok(Some(stored)) => {
                debug!(key = %key, stored, "upload target already exists");
                if stored != out.size {
                    return out.with_error(422, "existing object with wrong size");
                }
                return out;
            }
            Ok(None) => {}
            // An unanswered lookup cannot be told apart from absence.
            Err(err) => {
                debug!(key = %key, error = %err, "upload lookup failed, treating as absent")
            }
        }

        if out.size > self.settings.max_upload_size {
            return out.with_error(422, oversized_upload_message(self.settings.max_upload_size));
        }

        match self.gateway.presign_put(&key, self.settings.ttl).await {
            Ok(href) => BatchResponseObject {
                actions: Some(Actions::upload(Action::expiring_in(href, self.settings.ttl))),
                ..out
            },
            Err(err) => {
                warn!(key = %key, error = %err, "presigning upload failed");
                out.with_error(500, format!("could not generate upload URL: {err}"))
            }
        }
    }
}

fn oversized_upload_message(limit: i64) -> String {
    let limit = if limit == S3_SINGLE_PUT_LIMIT {
        "5GB".to_string()
    } else {
        format!("{limit} bytes")
    };
    format!("cannot upload objects larger than {limit} to S3 via LFS basic transfer adapter")
}
