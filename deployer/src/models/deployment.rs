//! Deployment models

use serde::{Deserialize, Deserializer, Serialize};

fn default_round() -> i64 {
    1
}

fn round_or_default<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or_else(default_round))
}

/// `null` decodes like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Inbound deployment request, as posted by the evaluator.
///
/// Every field is optional on the wire so that a missing field surfaces
/// as a validation error after the secret check, not as a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentRequestBody {
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub task: Option<String>,

    #[serde(default = "default_round", deserialize_with = "round_or_default")]
    pub round: i64,

    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(default)]
    pub evaluation_url: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub brief: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

/// Attachment carried inline as a data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,

    /// `<meta>,<base64>` payload, e.g. `data:image/png;base64,aGVsbG8=`
    #[serde(rename = "url", alias = "data_url")]
    pub data_url: String,
}

/// Attachment after its payload has been decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttachment {
    pub name: String,
    pub data: Vec<u8>,
}

/// A request that passed the secret check and field validation
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub requester_email: String,
    pub task_id: String,
    pub round_number: u32,
    pub nonce: String,
    pub evaluation_endpoint: url::Url,
    pub brief: String,
    pub attachments: Vec<DecodedAttachment>,
}

/// Completion report posted to the evaluation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "email")]
    pub requester_email: String,

    #[serde(rename = "task")]
    pub task_id: String,

    #[serde(rename = "round")]
    pub round_number: u32,

    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// Success response of the deployment endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResponse {
    pub status: String,
    pub repo: String,
    pub pages_url: String,
}
