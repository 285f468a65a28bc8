//! BatchService: the shared state behind `POST /objects/batch`.
//!
//! Built once at startup and cloned into every request; both collaborators
//! are read-only, so requests never contend on it.

use crate::{
    models::batch::{BatchRequest, BatchResponse},
    services::{
        auth::{AuthError, AuthStrategy},
        resolver::ObjectResolver,
    },
};
use futures::{StreamExt, stream};
use std::sync::Arc;

pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 16;

#[derive(Clone)]
pub struct BatchService {
    resolver: Arc<ObjectResolver>,
    auth: Option<Arc<dyn AuthStrategy>>,
    max_concurrent_lookups: usize,
}

impl BatchService {
    pub fn new(resolver: ObjectResolver, auth: Option<Arc<dyn AuthStrategy>>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            auth,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }

    pub fn with_max_concurrent_lookups(mut self, limit: usize) -> Self {
        self.max_concurrent_lookups = limit.max(1);
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// Runs the configured strategy. Always passes when none is configured.
    pub async fn authorize(&self, identity: &str, secret: &str) -> Result<(), AuthError> {
        match &self.auth {
            Some(strategy) => strategy.validate(identity, secret).await,
            None => Ok(()),
        }
    }

    /// Resolves every requested object. Lookups run concurrently but the
    /// response lists objects in request order.
    pub async fn process(&self, request: BatchRequest) -> BatchResponse {
        let operation = request.operation;
        let objects = stream::iter(request.objects)
            .map(|spec| {
                let resolver = self.resolver.clone();
                async move { resolver.resolve(operation, &spec.oid, spec.size).await }
            })
            .buffered(self.max_concurrent_lookups)
            .collect::<Vec<_>>()
            .await;

        BatchResponse::basic(objects)
    }
}
