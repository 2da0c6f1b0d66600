//! Repository models

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A remote repository on the hosting provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryHandle {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    pub default_branch: String,
}

impl RepositoryHandle {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Opaque token identifying the current state of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(pub String);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of reading a file from a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLookup {
    Found {
        content: Vec<u8>,
        version: VersionToken,
    },
    NotFound,
}

impl FileLookup {
    /// Content as text, or `None` when the file is absent.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn text(&self) -> Option<String> {
        match self {
            FileLookup::Found { content, version } => match String::from_utf8(content.clone()) {
                Ok(text) => Some(text),
                Err(_) => {
                    warn!(
                        "File at version {} is not valid UTF-8, decoding it lossily",
                        version
                    );
                    Some(String::from_utf8_lossy(content).into_owned())
                }
            },
            FileLookup::NotFound => None,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, FileLookup::Found { .. })
    }
}

/// Desired content of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(data) => data,
        }
    }

    /// Whether `remote` holds exactly this content
    pub fn matches(&self, remote: &[u8]) -> bool {
        match self {
            FileContent::Text(text) => std::str::from_utf8(remote).is_ok_and(|s| s == text),
            FileContent::Binary(data) => data.as_slice() == remote,
        }
    }
}

/// A file the deployer wants present in the repository
#[derive(Debug, Clone)]
pub struct FileDesired {
    pub path: String,
    pub content: FileContent,
    pub commit_message: String,
}

/// What reconciling one file did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationOutcome {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconciliationOutcome::Created => "created",
            ReconciliationOutcome::Updated => "updated",
            ReconciliationOutcome::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Outcome of a create-repository call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRepository {
    Created(RepositoryHandle),
    AlreadyExists,
}

/// Publish state of a repository's site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishState {
    pub enabled: bool,
    pub in_progress: bool,
}

/// Outcome of a publish configuration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishConfig {
    Configured,
    /// The provider reports that configuration is already underway
    InProgress,
}
