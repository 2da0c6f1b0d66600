//! Request handling: validate, reconcile, publish, notify
//!
//! Steps already committed upstream are never rolled back. A failed
//! request is retried by sending it again; reconciliation converges.

use secrecy::ExposeSecret;
use tracing::{error, info, info_span, warn, Instrument};

use crate::app::state::AppState;
use crate::deploy::fsm::{RequestEvent, RequestFsm};
use crate::deploy::pages::ensure_pages_published;
use crate::deploy::reconciler::{ensure_repository, upsert_file};
use crate::deploy::rounds::{accumulate_round, ARTIFACT_PATH, NARRATIVE_PATH};
use crate::deploy::validate::{decode_body, repo_name, validate};
use crate::errors::DeployerError;
use crate::models::deployment::{DeploymentRequest, DeploymentRequestBody, NotificationPayload};
use crate::models::repository::{
    FileContent, FileDesired, PublishState, ReconciliationOutcome, RepositoryHandle,
};
use crate::notify::notify;
use crate::utils::generate_uuid;

pub const LICENSE_PATH: &str = "LICENSE";

/// What a completed request did
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub repo_url: String,
    pub pages_url: String,
    pub commit_sha: String,
    /// Reconciliation outcome per file path, in write order
    pub files: Vec<(String, ReconciliationOutcome)>,
    pub publish: PublishState,
    pub notify_attempts: u32,
}

impl DeploymentReport {
    pub fn outcome(&self, path: &str) -> Option<ReconciliationOutcome> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| *outcome)
    }
}

/// MIT license text granted by `holder`
pub fn license_text(holder: &str) -> String {
    format!(
        "MIT License

Copyright (c) {holder}

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
"
    )
}

/// Handle a deployment request from its raw JSON body
pub async fn handle_raw_deployment(
    state: &AppState,
    raw: &[u8],
) -> Result<DeploymentReport, DeployerError> {
    let body = match decode_body(raw, state.secret.expose_secret()) {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejected deployment request: {}", e);
            return Err(e);
        }
    };
    handle_deployment(state, body).await
}

/// Handle one deployment request end to end
pub async fn handle_deployment(
    state: &AppState,
    body: DeploymentRequestBody,
) -> Result<DeploymentReport, DeployerError> {
    let mut fsm = RequestFsm::new();

    let request = match validate(body, state.secret.expose_secret()) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected deployment request: {}", e);
            advance(&mut fsm, RequestEvent::Abort(e.to_string()))?;
            return Err(e);
        }
    };
    advance(&mut fsm, RequestEvent::Validate)?;

    let span = info_span!(
        "deployment",
        request_id = %generate_uuid(),
        task = %request.task_id,
        round = request.round_number,
    );

    async move {
        let result = run(state, &request, &mut fsm).await;
        if let Err(e) = &result {
            if !fsm.is_terminal() {
                advance(&mut fsm, RequestEvent::Abort(e.to_string()))?;
            }
            error!("Deployment ended in {:?}: {}", fsm.state(), e);
        }
        result
    }
    .instrument(span)
    .await
}

async fn run(
    state: &AppState,
    request: &DeploymentRequest,
    fsm: &mut RequestFsm,
) -> Result<DeploymentReport, DeployerError> {
    let name = repo_name(&request.task_id)?;
    let _guard = state.locks.acquire(&name).await;
    let hosting = state.hosting.as_ref();

    let repo = ensure_repository(hosting, &name).await?;
    advance(fsm, RequestEvent::RepoEnsured)?;
    info!("Reconciling {} for round {}", repo.full_name(), request.round_number);

    let files = reconcile_files(state, &repo, request).await?;
    advance(fsm, RequestEvent::FilesReconciled)?;

    let publish = ensure_pages_published(
        hosting,
        &repo,
        &state.publish_strategies,
        &state.publish,
        tokio::time::sleep,
    )
    .await;
    advance(fsm, RequestEvent::PublishAttempted)?;

    let commit_sha = hosting.latest_commit_sha(&repo).await?;
    let pages_url = hosting.pages_url(&repo);

    let payload = NotificationPayload {
        requester_email: request.requester_email.clone(),
        task_id: request.task_id.clone(),
        round_number: request.round_number,
        nonce: request.nonce.clone(),
        repo_url: repo.html_url.clone(),
        commit_sha: commit_sha.clone(),
        pages_url: pages_url.clone(),
    };

    let notify_attempts = match notify(
        state.notifier.as_ref(),
        &request.evaluation_endpoint,
        &payload,
        &state.retry_policy,
        tokio::time::sleep,
    )
    .await
    {
        Ok(attempts) => {
            advance(fsm, RequestEvent::NotifySucceeded)?;
            attempts
        }
        Err(e) => {
            advance(fsm, RequestEvent::NotifyFailed(e.to_string()))?;
            return Err(e);
        }
    };

    Ok(DeploymentReport {
        repo_url: repo.html_url,
        pages_url,
        commit_sha,
        files,
        publish,
        notify_attempts,
    })
}

async fn reconcile_files(
    state: &AppState,
    repo: &RepositoryHandle,
    request: &DeploymentRequest,
) -> Result<Vec<(String, ReconciliationOutcome)>, DeployerError> {
    let hosting = state.hosting.as_ref();
    let mut files = Vec::with_capacity(3 + request.attachments.len());

    let license = FileDesired {
        path: LICENSE_PATH.to_string(),
        content: FileContent::Text(license_text(hosting.owner())),
        commit_message: "Add MIT License".to_string(),
    };
    files.push((LICENSE_PATH.to_string(), upsert_file(hosting, repo, &license).await?));

    let round = accumulate_round(
        hosting,
        state.generator.as_ref(),
        repo,
        &request.task_id,
        request.round_number,
        &request.brief,
    )
    .await?;
    files.push((ARTIFACT_PATH.to_string(), round.artifact));
    files.push((NARRATIVE_PATH.to_string(), round.narrative));

    for attachment in &request.attachments {
        let desired = FileDesired {
            path: attachment.name.clone(),
            content: FileContent::Binary(attachment.data.clone()),
            commit_message: format!("Add {}", attachment.name),
        };
        files.push((attachment.name.clone(), upsert_file(hosting, repo, &desired).await?));
    }

    Ok(files)
}

fn advance(fsm: &mut RequestFsm, event: RequestEvent) -> Result<(), DeployerError> {
    fsm.process(event).map_err(DeployerError::Internal)
}
