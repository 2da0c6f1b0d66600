//! HTTP request handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::app::state::AppState;
use crate::deploy::pipeline::handle_raw_deployment;
use crate::errors::DeployerError;
use crate::models::deployment::DeploymentResponse;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "llm-deployer".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deployment handler. The secret is checked before the body shape.
pub async fn deploy_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DeploymentResponse>, DeployerError> {
    let report = handle_raw_deployment(&state, &body).await?;

    Ok(Json(DeploymentResponse {
        status: "ok".to_string(),
        repo: report.repo_url,
        pages_url: report.pages_url,
    }))
}
