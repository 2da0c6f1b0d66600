//! GitHub adapter tests against a local stand-in for the REST API

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use llm_deployer::hosting::github::GitHubProvider;
use llm_deployer::hosting::HostingProvider;
use llm_deployer::models::repository::{
    CreateRepository, FileLookup, PublishConfig, PublishState, RepositoryHandle, VersionToken,
};

const TOKEN: &str = "ghp_test";

/// Bodies of every contents PUT, by file path
type Writes = Arc<Mutex<Vec<(String, Value)>>>;

fn repo_json(name: &str) -> Value {
    json!({
        "name": name,
        "html_url": format!("https://github.com/octo/{}", name),
        "default_branch": "main",
        "owner": {"login": "octo"},
    })
}

async fn create_repo(Json(body): Json<Value>) -> Response {
    match body["name"].as_str() {
        Some("demo") => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Repository creation failed.",
                "errors": [{"resource": "Repository", "field": "name", "message": "name already exists on this account"}],
            })),
        )
            .into_response(),
        Some("blocked") => (StatusCode::FORBIDDEN, Json(json!({"message": "Forbidden"}))).into_response(),
        Some(name) => (StatusCode::CREATED, Json(repo_json(name))).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn get_repo(Path((_owner, repo)): Path<(String, String)>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get("authorization")
        .is_some_and(|v| v == format!("Bearer {}", TOKEN).as_str());
    let versioned = headers.get("x-github-api-version").is_some();
    if !authorized || !versioned {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(repo_json(&repo)).into_response()
}

async fn get_contents(Path((_owner, _repo, path)): Path<(String, String, String)>) -> Response {
    match path.as_str() {
        "index.html" => Json(json!({
            "sha": "oldsha",
            "encoding": "base64",
            "content": STANDARD.encode("<p>old</p>"),
        }))
        .into_response(),
        "big.bin" => Json(json!({"sha": "blobsha", "encoding": "none", "content": ""})).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
    }
}

async fn put_contents(
    State(writes): State<Writes>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let status = if body.get("sha").is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    writes.lock().unwrap().push((path, body));
    status
}

async fn get_blob(Path((_owner, _repo, sha)): Path<(String, String, String)>) -> Response {
    if sha != "blobsha" {
        return StatusCode::NOT_FOUND.into_response();
    }
    // Blob content is line-wrapped like the real API
    Json(json!({"sha": sha, "encoding": "base64", "content": "aGVs\nbG8=\n"})).into_response()
}

async fn list_commits(Query(query): Query<HashMap<String, String>>) -> Response {
    let expected = query.get("sha").map(String::as_str) == Some("main")
        && query.get("per_page").map(String::as_str) == Some("1");
    if !expected {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!([{"sha": "c0ffee"}])).into_response()
}

async fn get_pages(Path((_owner, repo)): Path<(String, String)>) -> Response {
    match repo.as_str() {
        "demo" => Json(json!({"status": "building"})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn post_pages(Path((_owner, repo)): Path<(String, String)>) -> StatusCode {
    match repo.as_str() {
        "demo" => StatusCode::CONFLICT,
        "unsupported" => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::CREATED,
    }
}

async fn put_pages() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn spawn_api() -> (GitHubProvider, Writes) {
    let writes = Writes::default();
    let app = Router::new()
        .route("/user/repos", post(create_repo))
        .route("/repos/{owner}/{repo}", get(get_repo))
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_contents).put(put_contents),
        )
        .route("/repos/{owner}/{repo}/git/blobs/{sha}", get(get_blob))
        .route("/repos/{owner}/{repo}/commits", get(list_commits))
        .route(
            "/repos/{owner}/{repo}/pages",
            get(get_pages).post(post_pages).put(put_pages),
        )
        .with_state(writes.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let provider = GitHubProvider::new(
        &format!("http://{}", addr),
        "octo",
        SecretString::from(TOKEN),
    )
    .unwrap();
    (provider, writes)
}

fn handle(name: &str) -> RepositoryHandle {
    RepositoryHandle {
        owner: "octo".to_string(),
        name: name.to_string(),
        html_url: format!("https://github.com/octo/{}", name),
        default_branch: "main".to_string(),
    }
}

#[tokio::test]
async fn test_create_repository_outcomes() {
    let (provider, _) = spawn_api().await;

    match assert_ok!(provider.create_repository("fresh").await) {
        CreateRepository::Created(repo) => assert_eq!(repo, handle("fresh")),
        other => panic!("expected a new repository, got {:?}", other),
    }
    assert_eq!(
        assert_ok!(provider.create_repository("demo").await),
        CreateRepository::AlreadyExists
    );
    assert_err!(provider.create_repository("blocked").await);
}

#[tokio::test]
async fn test_get_repository_sends_credentials() {
    let (provider, _) = spawn_api().await;
    let repo = assert_ok!(provider.get_repository("demo").await);
    assert_eq!(repo, handle("demo"));
}

#[tokio::test]
async fn test_read_file_found_missing_and_blob_fallback() {
    let (provider, _) = spawn_api().await;
    let repo = handle("demo");

    assert_eq!(
        assert_ok!(provider.read_file(&repo, "index.html").await),
        FileLookup::Found {
            content: b"<p>old</p>".to_vec(),
            version: VersionToken("oldsha".to_string()),
        }
    );
    assert_eq!(
        assert_ok!(provider.read_file(&repo, "README.md").await),
        FileLookup::NotFound
    );
    assert_eq!(
        assert_ok!(provider.read_file(&repo, "big.bin").await),
        FileLookup::Found {
            content: b"hello".to_vec(),
            version: VersionToken("blobsha".to_string()),
        }
    );
}

#[tokio::test]
async fn test_update_sends_version_and_create_does_not() {
    let (provider, writes) = spawn_api().await;
    let repo = handle("demo");

    assert_ok!(
        provider
            .update_file(
                &repo,
                "index.html",
                b"<p>new</p>",
                "Round 2: revise index.html",
                &VersionToken("oldsha".to_string()),
            )
            .await
    );
    assert_ok!(
        provider
            .create_file(&repo, "assets/a.png", b"hello", "Add assets/a.png")
            .await
    );

    let writes = writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 2);

    let (path, body) = &writes[0];
    assert_eq!(path, "index.html");
    assert_eq!(body["sha"], "oldsha");
    assert_eq!(body["message"], "Round 2: revise index.html");
    assert_eq!(body["content"], STANDARD.encode("<p>new</p>"));

    let (path, body) = &writes[1];
    assert_eq!(path, "assets/a.png");
    assert!(body.get("sha").is_none());
    assert_eq!(body["content"], "aGVsbG8=");
}

#[tokio::test]
async fn test_latest_commit_sha() {
    let (provider, _) = spawn_api().await;
    assert_eq!(
        assert_ok!(provider.latest_commit_sha(&handle("demo")).await),
        "c0ffee"
    );
}

#[tokio::test]
async fn test_publish_state_and_configuration() {
    let (provider, _) = spawn_api().await;

    assert_eq!(
        assert_ok!(provider.publish_state(&handle("demo")).await),
        PublishState {
            enabled: true,
            in_progress: true,
        }
    );
    assert_eq!(
        assert_ok!(provider.publish_state(&handle("fresh")).await),
        PublishState::default()
    );

    assert_eq!(
        assert_ok!(provider.configure_publish(&handle("demo"), "main", "/").await),
        PublishConfig::InProgress
    );
    assert_eq!(
        assert_ok!(provider.configure_publish(&handle("fresh"), "main", "/").await),
        PublishConfig::Configured
    );
    assert_err!(provider.configure_publish(&handle("unsupported"), "main", "/").await);
    assert_eq!(
        assert_ok!(provider.configure_publish_legacy(&handle("unsupported"), "main").await),
        PublishConfig::Configured
    );
}
