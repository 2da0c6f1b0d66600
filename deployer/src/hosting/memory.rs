//! In-memory hosting provider, used for dry runs and tests

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::DeployerError;
use crate::hosting::github::pages_url;
use crate::hosting::HostingProvider;
use crate::models::repository::{
    CreateRepository, FileLookup, PublishConfig, PublishState, RepositoryHandle, VersionToken,
};

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    version: VersionToken,
}

#[derive(Debug, Clone)]
struct MemoryRepo {
    handle: RepositoryHandle,
    files: BTreeMap<String, StoredFile>,
    commits: Vec<String>,
    publish: PublishState,
}

/// How publish configuration calls answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishBehavior {
    pub primary_fails: bool,
    pub legacy_fails: bool,
    pub primary_conflict: bool,
}

#[derive(Debug, Default)]
struct State {
    repos: BTreeMap<String, MemoryRepo>,
    calls: Vec<String>,
    sequence: u64,
    publish_behavior: PublishBehavior,
    fail_reads: bool,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn repo_mut(&mut self, name: &str) -> Result<&mut MemoryRepo, DeployerError> {
        self.repos
            .get_mut(name)
            .ok_or_else(|| DeployerError::RepositoryError(format!("404 Not Found: {}", name)))
    }

    fn commit(&mut self, repo: &str, path: &str, content: &[u8]) -> Result<(), DeployerError> {
        let id = self.next_id();
        let repo = self.repo_mut(repo)?;
        repo.files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version: VersionToken(format!("v{}", id)),
            },
        );
        repo.commits.push(format!("{:040x}", id));
        Ok(())
    }
}

/// Hosting provider that keeps repositories in process memory
pub struct InMemoryProvider {
    owner: String,
    state: Mutex<State>,
}

impl InMemoryProvider {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Operations issued so far, as `"<operation>:<target>"`
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Only the write operations issued so far
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("create_file:") || c.starts_with("update_file:"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn repository_count(&self) -> usize {
        self.state().repos.len()
    }

    /// Content of a stored file
    pub fn file(&self, repo: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|f| f.content.clone())
    }

    pub fn file_text(&self, repo: &str, path: &str) -> Option<String> {
        self.file(repo, path)
            .map(|c| String::from_utf8_lossy(&c).into_owned())
    }

    /// Write a file out of band, as a person editing the repository would
    pub fn edit_file(&self, repo: &str, path: &str, content: &[u8]) -> Result<(), DeployerError> {
        self.state().commit(repo, path, content)
    }

    pub fn publish_state_of(&self, repo: &str) -> Option<PublishState> {
        self.state().repos.get(repo).map(|r| r.publish)
    }

    pub fn set_publish_behavior(&self, behavior: PublishBehavior) {
        self.state().publish_behavior = behavior;
    }

    /// Make every file read fail with an upstream error
    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }
}

#[async_trait]
impl HostingProvider for InMemoryProvider {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn pages_url(&self, repo: &RepositoryHandle) -> String {
        pages_url(&repo.owner, &repo.name)
    }

    async fn create_repository(&self, name: &str) -> Result<CreateRepository, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("create_repository:{}", name));
        if state.repos.contains_key(name) {
            return Ok(CreateRepository::AlreadyExists);
        }

        let handle = RepositoryHandle {
            owner: self.owner.clone(),
            name: name.to_string(),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
            default_branch: "main".to_string(),
        };
        state.repos.insert(
            name.to_string(),
            MemoryRepo {
                handle: handle.clone(),
                files: BTreeMap::new(),
                commits: Vec::new(),
                publish: PublishState::default(),
            },
        );
        Ok(CreateRepository::Created(handle))
    }

    async fn get_repository(&self, name: &str) -> Result<RepositoryHandle, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("get_repository:{}", name));
        Ok(state.repo_mut(name)?.handle.clone())
    }

    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileLookup, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("read_file:{}", path));
        if state.fail_reads {
            return Err(DeployerError::RepositoryError("502 Bad Gateway".to_string()));
        }
        let lookup = match state.repo_mut(&repo.name)?.files.get(path) {
            Some(file) => FileLookup::Found {
                content: file.content.clone(),
                version: file.version.clone(),
            },
            None => FileLookup::NotFound,
        };
        Ok(lookup)
    }

    async fn create_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        _message: &str,
    ) -> Result<(), DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("create_file:{}", path));
        if state.repo_mut(&repo.name)?.files.contains_key(path) {
            return Err(DeployerError::RepositoryError(format!(
                "422 Unprocessable Entity: {} already exists",
                path
            )));
        }
        state.commit(&repo.name, path, content)
    }

    async fn update_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        content: &[u8],
        _message: &str,
        version: &VersionToken,
    ) -> Result<(), DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("update_file:{}", path));
        let current = state
            .repo_mut(&repo.name)?
            .files
            .get(path)
            .map(|f| f.version.clone());
        if current.as_ref() != Some(version) {
            return Err(DeployerError::RepositoryError(format!(
                "409 Conflict: {} does not match {}",
                path, version
            )));
        }
        state.commit(&repo.name, path, content)
    }

    async fn latest_commit_sha(&self, repo: &RepositoryHandle) -> Result<String, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("latest_commit_sha:{}", repo.name));
        state
            .repo_mut(&repo.name)?
            .commits
            .last()
            .cloned()
            .ok_or_else(|| DeployerError::RepositoryError("409 Git Repository is empty".to_string()))
    }

    async fn publish_state(&self, repo: &RepositoryHandle) -> Result<PublishState, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("publish_state:{}", repo.name));
        Ok(state.repo_mut(&repo.name)?.publish)
    }

    async fn configure_publish(
        &self,
        repo: &RepositoryHandle,
        _branch: &str,
        _path: &str,
    ) -> Result<PublishConfig, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("configure_publish:{}", repo.name));
        let behavior = state.publish_behavior;
        if behavior.primary_fails {
            return Err(DeployerError::RepositoryError("422 Unprocessable Entity".to_string()));
        }
        let target = state.repo_mut(&repo.name)?;
        target.publish.enabled = true;
        if behavior.primary_conflict {
            target.publish.in_progress = true;
            return Ok(PublishConfig::InProgress);
        }
        Ok(PublishConfig::Configured)
    }

    async fn configure_publish_legacy(
        &self,
        repo: &RepositoryHandle,
        _branch: &str,
    ) -> Result<PublishConfig, DeployerError> {
        let mut state = self.state();
        state.calls.push(format!("configure_publish_legacy:{}", repo.name));
        if state.publish_behavior.legacy_fails {
            return Err(DeployerError::RepositoryError("403 Forbidden".to_string()));
        }
        state.repo_mut(&repo.name)?.publish.enabled = true;
        Ok(PublishConfig::Configured)
    }
}
