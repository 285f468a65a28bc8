//! `POST /objects/batch`: the Git LFS batch endpoint.
//!
//! Authorizes the caller, decodes the request, resolves every object and
//! answers with one JSON document. Object bytes never pass through here.

use crate::{
    errors::{AppError, lfs_headers},
    models::batch::BatchRequest,
    services::batch_service::BatchService,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use tracing::{Instrument, Span, debug, field, info_span, warn};
use uuid::Uuid;

/// Answer `POST /objects/batch` with per-object transfer actions.
pub async fn batch(
    State(service): State<BatchService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "batch",
        request_id = %request_id,
        operation = field::Empty,
        objects = field::Empty
    );

    handle_batch(service, headers, body)
        .instrument(span)
        .await
        .map_err(|err| err.with_request_id(request_id))
}

async fn handle_batch(
    service: BatchService,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if service.requires_auth() {
        let Some((identity, secret)) = basic_credentials(&headers) else {
            warn!("rejecting request without Basic credentials");
            return Err(AppError::unauthorized(None));
        };
        if let Err(err) = service.authorize(&identity, &secret).await {
            warn!(identity = %identity, error = %err, "rejecting request");
            return Err(AppError::unauthorized(Some(err.to_string().as_str())));
        }
    }

    let request: BatchRequest = serde_json::from_slice(&body).map_err(|err| {
        debug!(error = %err, "could not decode batch request");
        AppError::unparseable()
    })?;

    let span = Span::current();
    span.record("operation", request.operation.as_str());
    span.record("objects", request.objects.len());
    debug!(
        reference = request.reference.as_ref().map_or("", |r| r.name.as_str()),
        "processing batch"
    );

    let response = service.process(request).await;
    Ok((StatusCode::OK, lfs_headers(), Json(response)).into_response())
}

/// Extracts `(user, password)` from an `Authorization: Basic ...` header.
///
/// The password may itself contain `:`; only the first colon separates.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
