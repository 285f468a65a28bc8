//! End-to-end tests for `POST /objects/batch` through the full router.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose};
use http_body_util::BodyExt;
use lfs_batch_gateway::{
    routes::routes::routes,
    services::{
        auth::StaticCredentials,
        batch_service::BatchService,
        memory_gateway::InMemoryGateway,
        resolver::{ObjectResolver, ResolverSettings},
    },
};
use serde_json::{Value, json};
use tower::ServiceExt;

const LFS_JSON: &str = "application/vnd.git-lfs+json";

fn oid() -> String {
    "aa".repeat(32)
}

fn app(gateway: Arc<InMemoryGateway>, auth: bool) -> Router {
    let resolver = ObjectResolver::new(
        gateway,
        ResolverSettings {
            prefix: "lfs/".into(),
            ..ResolverSettings::default()
        },
    );
    let auth = auth.then(|| {
        Arc::new(StaticCredentials::new("git", "hunter2"))
            as Arc<dyn lfs_batch_gateway::services::auth::AuthStrategy>
    });
    routes().with_state(BatchService::new(resolver, auth))
}

fn basic(user: &str, pass: &str) -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{user}:{pass}"))
    )
}

fn batch_request(body: impl Into<Body>, authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/objects/batch")
        .header(header::CONTENT_TYPE, LFS_JSON)
        .header(header::ACCEPT, LFS_JSON);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(body.into()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, headers, body)
}

#[tokio::test]
async fn download_of_missing_object_reports_404_per_object() {
    let gateway = Arc::new(InMemoryGateway::default());
    let body = json!({"operation": "download", "objects": [{"oid": oid(), "size": 10}]});

    let (status, headers, body) =
        send(app(gateway, false), batch_request(body.to_string(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], LFS_JSON);
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let objects = body["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["oid"], oid());
    assert_eq!(objects[0]["size"], 10);
    assert_eq!(objects[0]["error"]["code"], 404);
    assert!(objects[0].get("actions").is_none());
}

#[tokio::test]
async fn download_with_size_mismatch_returns_stored_size_error_and_href() {
    let gateway = Arc::new(InMemoryGateway::default());
    gateway.insert(format!("lfs/{}", oid()), 20).await;
    let body = json!({"operation": "download", "objects": [{"oid": oid(), "size": 10}]});

    let (status, _, body) = send(app(gateway, false), batch_request(body.to_string(), None)).await;

    assert_eq!(status, StatusCode::OK);
    let object = &body["objects"][0];
    assert_eq!(object["size"], 20);
    assert_eq!(object["error"]["code"], 422);
    assert_eq!(object["error"]["message"], "found object with wrong size");
    let download = &object["actions"]["download"];
    assert_eq!(
        download["href"],
        format!("memory://lfs/lfs/{}?method=GET&expires_in=3600", oid())
    );
    assert_eq!(download["expires_in"], 3600);
    assert!(download.get("expires_at").is_none());
}

#[tokio::test]
async fn upload_mixes_new_existing_and_invalid_objects_in_order() {
    let gateway = Arc::new(InMemoryGateway::default());
    let existing = "bb".repeat(32);
    let conflicting = "cc".repeat(32);
    let oversized = "dd".repeat(32);
    gateway.insert(format!("lfs/{existing}"), 5).await;
    gateway.insert(format!("lfs/{conflicting}"), 5).await;

    let body = json!({
        "operation": "upload",
        "transfers": ["basic"],
        "ref": {"name": "refs/heads/main"},
        "objects": [
            {"oid": oid(), "size": 100},
            {"oid": existing, "size": 5},
            {"oid": "NOT-AN-OID", "size": 1},
            {"oid": conflicting, "size": 6},
            {"oid": oversized, "size": 5_000_000_000i64}
        ]
    });

    let (status, _, body) =
        send(app(gateway.clone(), false), batch_request(body.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transfer"], "basic");

    let objects = body["objects"].as_array().unwrap();
    let oids: Vec<&str> = objects.iter().map(|o| o["oid"].as_str().unwrap()).collect();
    let first = oid();
    assert_eq!(
        oids,
        vec![
            first.as_str(),
            existing.as_str(),
            "NOT-AN-OID",
            conflicting.as_str(),
            oversized.as_str(),
        ]
    );

    assert_eq!(objects[0]["actions"]["upload"]["expires_in"], 3600);
    assert!(objects[0].get("error").is_none());

    assert!(objects[1].get("actions").is_none());
    assert!(objects[1].get("error").is_none());

    assert_eq!(objects[2]["error"]["code"], 422);
    assert_eq!(
        objects[2]["error"]["message"],
        "oid must be a SHA-256 hash in lower case hexadecimal"
    );

    assert_eq!(objects[3]["error"]["code"], 422);
    assert_eq!(objects[3]["error"]["message"], "existing object with wrong size");
    assert!(objects[3].get("actions").is_none());

    assert_eq!(objects[4]["error"]["code"], 422);
    assert!(objects[4].get("actions").is_none());

    // the invalid oid never reached storage
    assert_eq!(gateway.stat_calls(), 4);
}

#[tokio::test]
async fn empty_object_list_yields_empty_response_list() {
    let gateway = Arc::new(InMemoryGateway::default());
    let body = json!({"operation": "download", "objects": []});

    let (status, _, body) = send(app(gateway, false), batch_request(body.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["objects"], json!([]));
}

#[tokio::test]
async fn null_collections_are_treated_as_empty() {
    let gateway = Arc::new(InMemoryGateway::default());
    let body = json!({"operation": "download", "transfers": null, "objects": null});

    let (status, headers, body) =
        send(app(gateway, false), batch_request(body.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], LFS_JSON);
    assert_eq!(body["transfer"], "basic");
    assert_eq!(body["objects"], json!([]));
}

#[tokio::test]
async fn malformed_body_is_404_with_documentation() {
    let gateway = Arc::new(InMemoryGateway::default());

    let (status, headers, body) =
        send(app(gateway, false), batch_request("{not json", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers[header::CONTENT_TYPE], LFS_JSON);
    assert_eq!(body["message"], "could not parse request");
    assert_eq!(
        body["documentation_url"],
        "https://github.com/git-lfs/git-lfs/blob/v2.12.0/docs/api/batch.md#requests"
    );
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn missing_credentials_are_challenged() {
    let gateway = Arc::new(InMemoryGateway::default());
    let body = json!({"operation": "download", "objects": [{"oid": oid(), "size": 1}]});

    let (status, headers, body) =
        send(app(gateway.clone(), true), batch_request(body.to_string(), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers["lfs-authenticate"], r#"Basic realm="Git LFS""#);
    assert_eq!(body["message"], "Unauthorized");
    assert_eq!(gateway.stat_calls(), 0);
}

#[tokio::test]
async fn wrong_credentials_are_rejected_before_parsing() {
    let gateway = Arc::new(InMemoryGateway::default());

    let (status, headers, body) = send(
        app(gateway, true),
        batch_request("{not json", Some(basic("git", "wrong"))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key("lfs-authenticate"));
    assert_eq!(body["message"], "Unauthorized: invalid credentials");
}

#[tokio::test]
async fn valid_credentials_reach_the_resolver() {
    let gateway = Arc::new(InMemoryGateway::default());
    gateway.insert(format!("lfs/{}", oid()), 10).await;
    let body = json!({"operation": "download", "objects": [{"oid": oid(), "size": 10}]});

    let (status, _, body) = send(
        app(gateway, true),
        batch_request(body.to_string(), Some(basic("git", "hunter2"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["objects"][0]["actions"]["download"]["href"].is_string());
    assert!(body["objects"][0].get("error").is_none());
}

#[tokio::test]
async fn broken_signer_fails_objects_not_the_batch() {
    let gateway = Arc::new(InMemoryGateway::default());
    gateway.insert(format!("lfs/{}", oid()), 10).await;
    gateway.set_signer_broken(true);
    let body = json!({
        "operation": "download",
        "objects": [{"oid": oid(), "size": 10}, {"oid": "ee".repeat(32), "size": 1}]
    });

    let (status, _, body) = send(app(gateway, false), batch_request(body.to_string(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["objects"][0]["error"]["code"], 500);
    assert_eq!(body["objects"][1]["error"]["code"], 404);
}

#[tokio::test]
async fn healthz_is_ok() {
    let gateway = Arc::new(InMemoryGateway::default());
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(app(gateway, false), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
