//! Shared fixtures for the deployer integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use url::Url;

use llm_deployer::app::state::AppState;
use llm_deployer::deploy::pages::PublishOptions;
use llm_deployer::errors::DeployerError;
use llm_deployer::generate::TextGenerator;
use llm_deployer::hosting::memory::InMemoryProvider;
use llm_deployer::models::deployment::{Attachment, DeploymentRequestBody, NotificationPayload};
use llm_deployer::notify::{NotifyTransport, RetryPolicy};
use llm_deployer::utils::CooldownOptions;

pub const SECRET: &str = "s3cret";
pub const OWNER: &str = "octo";
pub const TASK: &str = "captcha-solver";

/// Generator answering with a numbered page and recording every prompt
#[derive(Default)]
pub struct FakeGenerator {
    prompts: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl FakeGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, DeployerError> {
        if *self.fail.lock().unwrap() {
            return Err(DeployerError::GenerationError("upstream 500".to_string()));
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!(
            "Here you go:\n```html\n<html><body>page {}</body></html>\n```\n",
            prompts.len()
        ))
    }
}

/// Notifier answering with queued statuses, then 200
#[derive(Default)]
pub struct FakeNotifier {
    statuses: Mutex<VecDeque<StatusCode>>,
    received: Mutex<Vec<(Url, NotificationPayload)>>,
}

impl FakeNotifier {
    pub fn queue(&self, statuses: &[StatusCode]) {
        self.statuses.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn received(&self) -> Vec<(Url, NotificationPayload)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyTransport for FakeNotifier {
    async fn post(
        &self,
        endpoint: &Url,
        payload: &NotificationPayload,
    ) -> Result<StatusCode, DeployerError> {
        self.received
            .lock()
            .unwrap()
            .push((endpoint.clone(), payload.clone()));
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusCode::OK))
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub hosting: Arc<InMemoryProvider>,
    pub generator: Arc<FakeGenerator>,
    pub notifier: Arc<FakeNotifier>,
}

/// State wired to in-memory collaborators with millisecond backoff
pub fn harness() -> Harness {
    let hosting = Arc::new(InMemoryProvider::new(OWNER));
    let generator = Arc::new(FakeGenerator::default());
    let notifier = Arc::new(FakeNotifier::default());

    let state = AppState::new(
        SecretString::from(SECRET),
        hosting.clone(),
        generator.clone(),
        notifier.clone(),
    )
    .with_retry_policy(RetryPolicy {
        max_attempts: 5,
        cooldown: CooldownOptions {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        },
    })
    .with_publish_options(PublishOptions {
        settle_delay: Duration::ZERO,
    });

    Harness {
        state: Arc::new(state),
        hosting,
        generator,
        notifier,
    }
}

pub fn request(round: i64, brief: &str) -> DeploymentRequestBody {
    DeploymentRequestBody {
        secret: Some(SECRET.to_string()),
        email: Some("student@example.com".to_string()),
        task: Some(TASK.to_string()),
        round,
        nonce: Some("ab12".to_string()),
        evaluation_url: Some("https://evaluator.example.com/notify".to_string()),
        brief: brief.to_string(),
        attachments: vec![],
    }
}

pub fn attachment(name: &str, data_url: &str) -> Attachment {
    Attachment {
        name: name.to_string(),
        data_url: data_url.to_string(),
    }
}
