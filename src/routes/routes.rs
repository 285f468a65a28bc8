//! Defines routes for the LFS batch server.
//!
//! - `POST /objects/batch` -> batch API (download/upload negotiation)
//! - `GET  /healthz`       -> liveness

use crate::{
    handlers::{batch_handlers::batch, health_handlers::healthz},
    services::batch_service::BatchService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. Handlers share a `BatchService` as state.
pub fn routes() -> Router<BatchService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/objects/batch", post(batch))
}
