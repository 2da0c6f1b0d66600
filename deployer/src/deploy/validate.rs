//! Inbound request validation
//!
//! Runs before any side effect: nothing here talks to the hosting or
//! generation providers.

use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;
use url::Url;

use crate::deploy::pipeline::LICENSE_PATH;
use crate::deploy::rounds::{ARTIFACT_PATH, NARRATIVE_PATH};
use crate::errors::DeployerError;
use crate::models::deployment::{
    Attachment, DecodedAttachment, DeploymentRequest, DeploymentRequestBody,
};
use crate::utils::secrets_match;

/// Longest repository name derived from a task id
pub const MAX_REPO_NAME_LEN: usize = 80;

/// Repository name for a task. Stable across rounds of the same task.
pub fn repo_name(task_id: &str) -> Result<String, DeployerError> {
    let name: String = task_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_REPO_NAME_LEN)
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        return Err(DeployerError::ValidationError(format!(
            "Task id {:?} does not yield a repository name",
            task_id
        )));
    }
    Ok(name)
}

/// Decode a raw request body, checking the secret before anything else.
///
/// A body that is not JSON carries no readable secret and is rejected as
/// unauthorized; an authenticated body of the wrong shape is a validation
/// error.
pub fn decode_body(
    raw: &[u8],
    expected_secret: &str,
) -> Result<DeploymentRequestBody, DeployerError> {
    let value: serde_json::Value = serde_json::from_slice(raw).unwrap_or(serde_json::Value::Null);
    let provided = value
        .get("secret")
        .and_then(|secret| secret.as_str())
        .unwrap_or_default();
    if !secrets_match(expected_secret, provided) {
        return Err(DeployerError::Unauthorized);
    }

    serde_json::from_value(value)
        .map_err(|e| DeployerError::ValidationError(format!("Malformed request body: {}", e)))
}

/// Check the secret, then required fields and attachments
pub fn validate(
    body: DeploymentRequestBody,
    expected_secret: &str,
) -> Result<DeploymentRequest, DeployerError> {
    let provided = body.secret.as_deref().unwrap_or_default();
    if !secrets_match(expected_secret, provided) {
        return Err(DeployerError::Unauthorized);
    }

    let requester_email = required(body.email, "email")?;
    let task_id = required(body.task, "task")?;
    let nonce = required(body.nonce, "nonce")?;
    let evaluation_url = required(body.evaluation_url, "evaluation_url")?;

    let round_number = u32::try_from(body.round)
        .ok()
        .filter(|round| *round >= 1)
        .ok_or_else(|| {
            DeployerError::ValidationError(format!("round must be at least 1, got {}", body.round))
        })?;

    let evaluation_endpoint = Url::parse(&evaluation_url)
        .map_err(|e| DeployerError::ValidationError(format!("Invalid evaluation_url: {}", e)))?;
    if !matches!(evaluation_endpoint.scheme(), "http" | "https") {
        return Err(DeployerError::ValidationError(format!(
            "evaluation_url must use http or https, got {}",
            evaluation_endpoint.scheme()
        )));
    }

    repo_name(&task_id)?;

    let attachments = decode_attachments(&body.attachments)?;

    Ok(DeploymentRequest {
        requester_email,
        task_id,
        round_number,
        nonce,
        evaluation_endpoint,
        brief: body.brief,
        attachments,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, DeployerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DeployerError::ValidationError(format!("Missing required field: {}", field)))
}

/// Decode every attachment; payloads without a `,` separator are skipped.
///
/// Names must be unique within a request.
pub fn decode_attachments(
    attachments: &[Attachment],
) -> Result<Vec<DecodedAttachment>, DeployerError> {
    let mut decoded = Vec::with_capacity(attachments.len());
    let mut seen = HashSet::with_capacity(attachments.len());
    for attachment in attachments {
        check_attachment_path(&attachment.name)?;
        if !seen.insert(attachment.name.as_str()) {
            return Err(DeployerError::ValidationError(format!(
                "Duplicate attachment name: {}",
                attachment.name
            )));
        }

        let Some((_, payload)) = attachment.data_url.split_once(',') else {
            warn!("Attachment {} is not a data URL, skipping", attachment.name);
            continue;
        };

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let data = STANDARD.decode(compact).map_err(|e| {
            DeployerError::ValidationError(format!(
                "Attachment {} is not valid base64: {}",
                attachment.name, e
            ))
        })?;

        decoded.push(DecodedAttachment {
            name: attachment.name.clone(),
            data,
        });
    }
    Ok(decoded)
}

fn check_attachment_path(name: &str) -> Result<(), DeployerError> {
    let invalid = name.trim().is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."));
    if invalid {
        return Err(DeployerError::ValidationError(format!(
            "Invalid attachment name: {:?}",
            name
        )));
    }
    if [LICENSE_PATH, ARTIFACT_PATH, NARRATIVE_PATH].contains(&name) {
        return Err(DeployerError::ValidationError(format!(
            "Attachment {} would overwrite a generated file",
            name
        )));
    }
    Ok(())
}
