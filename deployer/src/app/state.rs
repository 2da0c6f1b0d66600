//! Application state management

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::app::settings::Settings;
use crate::deploy::locks::RepoLocks;
use crate::deploy::pages::{default_strategies, PublishOptions, PublishStrategy};
use crate::errors::DeployerError;
use crate::generate::completions::ChatCompletionsClient;
use crate::generate::TextGenerator;
use crate::hosting::github::GitHubProvider;
use crate::hosting::memory::InMemoryProvider;
use crate::hosting::HostingProvider;
use crate::notify::{HttpNotifyTransport, NotifyTransport, RetryPolicy};

/// Collaborators shared by every request.
///
/// Built once at startup and dropped at shutdown; the hosting client
/// stays authenticated for the life of the process.
pub struct AppState {
    /// Shared secret callers must present
    pub secret: SecretString,

    /// Hosting provider client
    pub hosting: Arc<dyn HostingProvider>,

    /// Text-generation client
    pub generator: Arc<dyn TextGenerator>,

    /// Evaluator notification transport
    pub notifier: Arc<dyn NotifyTransport>,

    /// Notification retry policy
    pub retry_policy: RetryPolicy,

    /// Publish options
    pub publish: PublishOptions,

    /// Publish strategies, tried in order
    pub publish_strategies: Vec<Box<dyn PublishStrategy>>,

    /// Per-repository locks
    pub locks: RepoLocks,
}

impl AppState {
    /// Create a state with default policies
    pub fn new(
        secret: SecretString,
        hosting: Arc<dyn HostingProvider>,
        generator: Arc<dyn TextGenerator>,
        notifier: Arc<dyn NotifyTransport>,
    ) -> Self {
        Self {
            secret,
            hosting,
            generator,
            notifier,
            retry_policy: RetryPolicy::default(),
            publish: PublishOptions::default(),
            publish_strategies: default_strategies(),
            locks: RepoLocks::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_publish_options(mut self, publish: PublishOptions) -> Self {
        self.publish = publish;
        self
    }

    /// Build the production clients from settings
    pub fn from_settings(settings: &Settings) -> Result<Self, DeployerError> {
        info!("Initializing application state...");

        let hosting: Arc<dyn HostingProvider> = if settings.dry_run {
            info!("Dry run: repositories are kept in memory");
            Arc::new(InMemoryProvider::new(&settings.github_username))
        } else {
            Arc::new(GitHubProvider::new(
                &settings.github_api_url,
                &settings.github_username,
                settings.github_token.clone(),
            )?)
        };

        let generator = Arc::new(ChatCompletionsClient::new(
            &settings.llm_api_url,
            &settings.llm_model,
            settings.llm_token.clone(),
        )?);

        let notifier = Arc::new(HttpNotifyTransport::new()?);

        Ok(Self::new(settings.secret.clone(), hosting, generator, notifier)
            .with_retry_policy(settings.retry_policy())
            .with_publish_options(PublishOptions {
                settle_delay: settings.pages_settle_delay,
            }))
    }
}
