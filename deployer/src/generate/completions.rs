//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::DeployerError;
use crate::generate::TextGenerator;
use crate::http::client::HttpClient;

pub const DEFAULT_API_URL: &str = "https://aiproxy.sanand.workers.dev/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Generation calls are never retried, so the timeout bounds the request.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions endpoint client
pub struct ChatCompletionsClient {
    http_client: HttpClient,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(api_url: &str, model: &str, token: SecretString) -> Result<Self, DeployerError> {
        let http_client = HttpClient::new(api_url, GENERATION_TIMEOUT, header::HeaderMap::new())?
            .with_bearer_token(token);
        Ok(Self {
            http_client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, DeployerError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .http_client
            .post("", &request)
            .await
            .map_err(|e| DeployerError::GenerationError(e.to_string()))?;

        if !response.is_success() {
            error!("Generation request failed: {} - {}", response.status, response.body);
            return Err(DeployerError::GenerationError(format!(
                "{}: {}",
                response.status, response.body
            )));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| DeployerError::GenerationError(format!("Unexpected response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DeployerError::GenerationError("Response contained no content".to_string()))
    }
}
