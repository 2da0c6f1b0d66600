//! HTTP surface tests, driven through the router without a socket

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use llm_deployer::deploy::rounds::ARTIFACT_PATH;
use llm_deployer::server::serve::router;

use common::{harness, request, OWNER, TASK};

fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api-endpoint")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = router(h.state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_version() {
    let h = harness();
    let response = router(h.state.clone())
        .oneshot(Request::get("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["git_hash"].is_string());
    assert!(body["build_time"].is_string());
}

#[tokio::test]
async fn test_deploy_success_shape() {
    let h = harness();
    let body = serde_json::to_value(request(1, "Solve captchas")).unwrap();

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["repo"], format!("https://github.com/{}/{}", OWNER, TASK));
    assert_eq!(body["pages_url"], format!("https://{}.github.io/{}/", OWNER, TASK));
    assert!(h.hosting.file(TASK, ARTIFACT_PATH).is_some());
}

#[tokio::test]
async fn test_wrong_secret_is_forbidden() {
    let h = harness();
    let mut body = serde_json::to_value(request(1, "Solve captchas")).unwrap();
    body["secret"] = json!("guess");

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({"detail": "Invalid secret"}));
    assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let h = harness();
    let body = json!({
        "secret": common::SECRET,
        "email": "student@example.com",
        "round": 1,
        "nonce": "ab12",
        "evaluation_url": "https://evaluator.example.com/notify",
        "brief": "Solve captchas",
    });

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("task"), "{}", detail);
}

#[tokio::test]
async fn test_attachments_use_url_key_on_the_wire() {
    let h = harness();
    let mut body = serde_json::to_value(request(1, "Show the logo")).unwrap();
    body["attachments"] = json!([{"name": "a.png", "url": "data:image/png;base64,aGVsbG8="}]);

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.hosting.file(TASK, "a.png").unwrap(), b"hello");
}

#[tokio::test]
async fn test_failed_notification_is_server_error() {
    let h = harness();
    h.notifier.queue(&[reqwest::StatusCode::BAD_GATEWAY; 5]);
    let body = serde_json::to_value(request(1, "Solve captchas")).unwrap();

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Eval notify failed"), "{}", detail);
}

#[tokio::test]
async fn test_wrong_secret_with_malformed_body_is_forbidden() {
    let h = harness();
    let body = json!({"secret": "guess", "task": "t", "round": "2", "brief": null});

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({"detail": "Invalid secret"}));
    assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_forbidden() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api-endpoint")
        .body(Body::from("secret=s3cret"))
        .unwrap();

    let response = router(h.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["detail"], "Invalid secret");
}

#[tokio::test]
async fn test_malformed_body_with_valid_secret_is_bad_request() {
    let h = harness();
    let mut body = serde_json::to_value(request(1, "Solve captchas")).unwrap();
    body["round"] = json!("2");

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Validation error: Malformed request body"), "{}", detail);
    assert!(h.hosting.calls().is_empty());
}

#[tokio::test]
async fn test_null_brief_and_attachments_are_accepted() {
    let h = harness();
    let mut body = serde_json::to_value(request(1, "")).unwrap();
    body["brief"] = Value::Null;
    body["attachments"] = Value::Null;

    let response = router(h.state.clone())
        .oneshot(post_json(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let narrative = h.hosting.file_text(TASK, "README.md").unwrap();
    assert!(narrative.contains("## Round 1\n\n_No brief provided._\n"));
}
