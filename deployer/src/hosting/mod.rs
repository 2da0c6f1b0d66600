//! Version-control hosting provider

pub mod github;
pub mod memory;

use async_trait::async_trait;

use crate::errors::DeployerError;
use crate::models::repository::{
    CreateRepository, FileLookup, PublishConfig, PublishState, RepositoryHandle, VersionToken,
};

/// Operations consumed from the hosting provider.
///
/// One authenticated instance lives for the whole process and is shared
/// by every request. Expected conditions ("already exists", "not found",
/// "already configuring") are reported as variants; every `Err` is an
/// upstream repository failure.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// Account that owns the repositories
    fn owner(&self) -> &str;

    /// Public site URL for a repository
    fn pages_url(&self, repo: &RepositoryHandle) -> String;

    async fn create_repository(&self, name: &str) -> Result<CreateRepository, DeployerError>;

    async fn get_repository(&self, name: &str) -> Result<RepositoryHandle, DeployerError>;

    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileLookup, DeployerError>;

    async fn create_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), DeployerError>;

    async fn update_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        message: &str,
        version: &VersionToken,
    ) -> Result<(), DeployerError>;

    /// Identifier of the newest commit on the default branch
    async fn latest_commit_sha(&self, repo: &RepositoryHandle) -> Result<String, DeployerError>;

    async fn publish_state(&self, repo: &RepositoryHandle) -> Result<PublishState, DeployerError>;

    /// Serve `branch` at `path` as the public site
    async fn configure_publish(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        path: &str,
    ) -> Result<PublishConfig, DeployerError>;

    /// Older configuration endpoint, used when the primary one is refused
    async fn configure_publish_legacy(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<PublishConfig, DeployerError>;
}
