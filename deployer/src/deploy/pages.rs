//! Best-effort enabling of the public site

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::errors::DeployerError;
use crate::hosting::HostingProvider;
use crate::models::repository::{PublishConfig, PublishState, RepositoryHandle};

/// Publish options
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Pause after an "already configuring" answer, before dependent reads
    pub settle_delay: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// One way of configuring the publish source
#[async_trait]
pub trait PublishStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        provider: &dyn HostingProvider,
        repo: &RepositoryHandle,
    ) -> Result<PublishConfig, DeployerError>;
}

/// Serve the default branch from the repository root
pub struct BranchRootSource;

#[async_trait]
impl PublishStrategy for BranchRootSource {
    fn name(&self) -> &'static str {
        "branch-root"
    }

    async fn attempt(
        &self,
        provider: &dyn HostingProvider,
        repo: &RepositoryHandle,
    ) -> Result<PublishConfig, DeployerError> {
        provider
            .configure_publish(repo, &repo.default_branch, "/")
            .await
    }
}

/// Legacy build configuration for the default branch
pub struct LegacyBranchSource;

#[async_trait]
impl PublishStrategy for LegacyBranchSource {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn attempt(
        &self,
        provider: &dyn HostingProvider,
        repo: &RepositoryHandle,
    ) -> Result<PublishConfig, DeployerError> {
        provider
            .configure_publish_legacy(repo, &repo.default_branch)
            .await
    }
}

/// Strategies in the order they are tried
pub fn default_strategies() -> Vec<Box<dyn PublishStrategy>> {
    vec![Box::new(BranchRootSource), Box::new(LegacyBranchSource)]
}

/// Make sure the repository is served as a public site.
///
/// Never fails: when every strategy is refused the failure is logged and
/// the last known state is returned.
pub async fn ensure_pages_published<S, F>(
    provider: &dyn HostingProvider,
    repo: &RepositoryHandle,
    strategies: &[Box<dyn PublishStrategy>],
    options: &PublishOptions,
    sleep_fn: S,
) -> PublishState
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let current = match provider.publish_state(repo).await {
        Ok(state) => state,
        Err(e) => {
            warn!("Unable to read publish state of {}: {}", repo.full_name(), e);
            PublishState::default()
        }
    };
    if current.enabled {
        debug!("{} is already published", repo.full_name());
        return current;
    }

    for strategy in strategies {
        match strategy.attempt(provider, repo).await {
            Ok(PublishConfig::Configured) => {
                info!("Enabled publishing of {} ({})", repo.full_name(), strategy.name());
                return PublishState {
                    enabled: true,
                    in_progress: false,
                };
            }
            Ok(PublishConfig::InProgress) => {
                info!(
                    "Publishing of {} already being configured ({}), waiting {:?}",
                    repo.full_name(),
                    strategy.name(),
                    options.settle_delay
                );
                sleep_fn(options.settle_delay).await;
                return PublishState {
                    enabled: false,
                    in_progress: true,
                };
            }
            Err(e) => {
                warn!(
                    "Publish strategy {} failed for {}: {}",
                    strategy.name(),
                    repo.full_name(),
                    e
                );
            }
        }
    }

    error!("Could not enable publishing of {}", repo.full_name());
    current
}
