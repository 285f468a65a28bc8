use anyhow::{Context, Result};
use axum::Router;
use lfs_batch_gateway::{
    config::{self, AuthConfig},
    routes,
    services::{
        auth::{AuthStrategy, GithubOrgMembership, StaticCredentials},
        batch_service::BatchService,
        resolver::ObjectResolver,
        storage::{S3Gateway, StorageGateway},
    },
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting lfs-batch-gateway with config: {:?}", cfg);

    // --- Storage gateway ---
    let gateway: Arc<dyn StorageGateway> =
        Arc::new(S3Gateway::new(&cfg.s3).context("configuring S3 gateway")?);

    // --- Authorization strategy ---
    let auth: Option<Arc<dyn AuthStrategy>> = match &cfg.auth {
        AuthConfig::Static { user, pass } => {
            Some(Arc::new(StaticCredentials::new(user.clone(), pass.clone())))
        }
        AuthConfig::GithubOrg { org } => Some(Arc::new(GithubOrgMembership::new(org.clone()))),
        AuthConfig::None => {
            tracing::warn!("Authorization disabled; anyone can request presigned URLs");
            None
        }
    };

    // --- Initialize core service ---
    let resolver = ObjectResolver::new(gateway, cfg.resolver.clone());
    let service =
        BatchService::new(resolver, auth).with_max_concurrent_lookups(cfg.max_concurrent_lookups);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
