//! In-memory StorageGateway.
//!
//! Holds object sizes in a map and mints fake presigned URLs of the form
//! `{base_url}/{key}?method=GET&expires_in=3600`. Lookups and signing can be
//! switched to fail so callers can exercise degraded backends.

use crate::services::storage::{StorageError, StorageGateway, StorageResult};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct InMemoryGateway {
    base_url: String,
    objects: RwLock<HashMap<String, i64>>,
    stat_calls: AtomicUsize,
    presign_calls: AtomicUsize,
    lookups_unavailable: AtomicBool,
    signer_broken: AtomicBool,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new("memory://lfs")
    }
}

impl InMemoryGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            stat_calls: AtomicUsize::new(0),
            presign_calls: AtomicUsize::new(0),
            lookups_unavailable: AtomicBool::new(false),
            signer_broken: AtomicBool::new(false),
        }
    }

    /// Store (or replace) an object's size under `key`.
    pub async fn insert(&self, key: impl Into<String>, size: i64) {
        self.objects.write().await.insert(key.into(), size);
    }

    /// Make every `stat` fail as if the backend were unreachable.
    pub fn set_lookups_unavailable(&self, unavailable: bool) {
        self.lookups_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every presign call fail.
    pub fn set_signer_broken(&self, broken: bool) {
        self.signer_broken.store(broken, Ordering::SeqCst);
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }

    fn sign(&self, method: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        if self.signer_broken.load(Ordering::SeqCst) {
            return Err(StorageError::Presign {
                key: key.to_string(),
                reason: "signer misconfigured".into(),
            });
        }
        Ok(format!(
            "{}/{}?method={}&expires_in={}",
            self.base_url,
            key,
            method,
            ttl.as_secs()
        ))
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    async fn stat(&self, key: &str) -> StorageResult<Option<i64>> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.lookups_unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "connection refused while looking up `{key}`"
            )));
        }
        Ok(self.objects.read().await.get(key).copied())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.sign("GET", key, ttl)
    }

    async fn presign_put(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.sign("PUT", key, ttl)
    }
}
