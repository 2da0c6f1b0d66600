//! Repository reconciliation
//!
//! Brings a remote repository to a desired state with as few writes as
//! possible. Re-running with the same desired files issues no writes.

use tracing::{debug, info};

use crate::errors::DeployerError;
use crate::hosting::HostingProvider;
use crate::models::repository::{
    CreateRepository, FileDesired, FileLookup, ReconciliationOutcome, RepositoryHandle,
};

/// Create the repository, or fetch it when the account already has one by that name
pub async fn ensure_repository(
    provider: &dyn HostingProvider,
    name: &str,
) -> Result<RepositoryHandle, DeployerError> {
    match provider.create_repository(name).await? {
        CreateRepository::Created(repo) => Ok(repo),
        CreateRepository::AlreadyExists => {
            info!("Repository {} exists, reusing it", name);
            provider.get_repository(name).await
        }
    }
}

/// Read the file at `desired.path` and bring it to the desired content
pub async fn upsert_file(
    provider: &dyn HostingProvider,
    repo: &RepositoryHandle,
    desired: &FileDesired,
) -> Result<ReconciliationOutcome, DeployerError> {
    let existing = provider.read_file(repo, &desired.path).await?;
    apply(provider, repo, desired, existing).await
}

/// Reconcile against content the caller has already read
pub async fn apply(
    provider: &dyn HostingProvider,
    repo: &RepositoryHandle,
    desired: &FileDesired,
    existing: FileLookup,
) -> Result<ReconciliationOutcome, DeployerError> {
    let content = desired.content.as_bytes();

    let outcome = match existing {
        FileLookup::Found { content: remote, .. } if desired.content.matches(&remote) => {
            debug!("{} already up to date", desired.path);
            ReconciliationOutcome::Unchanged
        }
        FileLookup::Found { version, .. } => {
            provider
                .update_file(repo, &desired.path, content, &desired.commit_message, &version)
                .await?;
            ReconciliationOutcome::Updated
        }
        FileLookup::NotFound => {
            provider
                .create_file(repo, &desired.path, content, &desired.commit_message)
                .await?;
            ReconciliationOutcome::Created
        }
    };

    info!("{} {}: {}", repo.full_name(), desired.path, outcome);
    Ok(outcome)
}
