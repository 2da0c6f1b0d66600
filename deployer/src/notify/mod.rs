//! Completion notification with bounded retry

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use tracing::{info, warn};
use url::Url;

use crate::errors::DeployerError;
use crate::http::client::HttpClient;
use crate::models::deployment::NotificationPayload;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Per-attempt timeout of the notification call
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry policy for notifying the evaluator
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown: CooldownOptions::default(),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the failed attempt with index `attempt` (0-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calc_exp_backoff(&self.cooldown, attempt)
    }
}

/// Delivers a notification payload and reports the response status
#[async_trait]
pub trait NotifyTransport: Send + Sync {
    async fn post(
        &self,
        endpoint: &Url,
        payload: &NotificationPayload,
    ) -> Result<StatusCode, DeployerError>;
}

/// JSON-over-HTTP transport
pub struct HttpNotifyTransport {
    http_client: HttpClient,
}

impl HttpNotifyTransport {
    pub fn new() -> Result<Self, DeployerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            http_client: HttpClient::new("", NOTIFY_TIMEOUT, headers)?,
        })
    }
}

#[async_trait]
impl NotifyTransport for HttpNotifyTransport {
    async fn post(
        &self,
        endpoint: &Url,
        payload: &NotificationPayload,
    ) -> Result<StatusCode, DeployerError> {
        let response = self
            .http_client
            .post_url(endpoint.as_str(), payload)
            .await
            .map_err(|e| DeployerError::NotificationError(e.to_string()))?;
        if !response.is_success() {
            warn!("Evaluator answered {}: {}", response.status, response.body);
        }
        Ok(response.status)
    }
}

/// Send `payload` to `endpoint`, retrying with exponential backoff.
///
/// Transport errors and non-2xx answers are retried alike. Returns the
/// number of attempts made on success.
pub async fn notify<S, F>(
    transport: &dyn NotifyTransport,
    endpoint: &Url,
    payload: &NotificationPayload,
    policy: &RetryPolicy,
    sleep_fn: S,
) -> Result<u32, DeployerError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_failure = String::new();

    for attempt in 0..max_attempts {
        match transport.post(endpoint, payload).await {
            Ok(status) if status.is_success() => {
                info!(
                    "Notified {} on attempt {}/{}",
                    endpoint,
                    attempt + 1,
                    max_attempts
                );
                return Ok(attempt + 1);
            }
            Ok(status) => {
                last_failure = format!("status {}", status);
            }
            Err(e) => {
                last_failure = e.to_string();
            }
        }

        warn!(
            "Notification attempt {}/{} failed: {}",
            attempt + 1,
            max_attempts,
            last_failure
        );

        if attempt + 1 < max_attempts {
            sleep_fn(policy.delay_after(attempt)).await;
        }
    }

    Err(DeployerError::NotificationError(format!(
        "{} attempts failed, last: {}",
        max_attempts, last_failure
    )))
}
