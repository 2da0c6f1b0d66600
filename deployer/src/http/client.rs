//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::errors::DeployerError;

const USER_AGENT: &str = concat!("llm-deployer/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// HTTP client for upstream APIs.
///
/// Non-2xx responses are returned as [`ApiResponse`] rather than errors so
/// that callers can branch on provider-specific status codes; only
/// transport failures surface as `Err`.
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        timeout: Duration,
        default_headers: header::HeaderMap,
    ) -> Result<Self, DeployerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate every request with a bearer token
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<ApiResponse, reqwest::Error> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        self.execute(self.request(Method::GET, &url)).await
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        self.execute(self.request(Method::POST, &url).json(body)).await
    }

    /// Make a PUT request
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PUT {}", url);
        self.execute(self.request(Method::PUT, &url).json(body)).await
    }

    /// POST a JSON body to an absolute URL, ignoring the base URL
    pub async fn post_url<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ApiResponse, reqwest::Error> {
        debug!("POST {}", url);
        self.execute(self.request(Method::POST, url).json(body)).await
    }
}
