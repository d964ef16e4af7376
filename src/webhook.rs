//! GitLab push event payload

use serde::Deserialize;

use crate::error::{Result, WebhookError};

/// Push notification as sent by GitLab.
///
/// Only basic field extraction is done: any field may be missing and falls
/// back to its default. A value of the wrong type fails the whole decode.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PushEvent {
    pub before: String,
    pub after: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub user_name: String,
    pub user_id: i64,
    pub project_id: i64,
    pub repository: Repository,
    pub commits: Vec<Commit>,
    pub total_commits_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub description: String,
    #[serde(alias = "home")]
    pub homepage: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub timestamp: String,
    pub url: String,
    pub author: Author,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl PushEvent {
    /// Decode a request body into a push event.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Branch name carried by this push, see [`derive_branch`].
    pub fn branch(&self) -> &str {
        derive_branch(&self.git_ref)
    }
}

/// Returns the last `/`-separated segment of a ref.
///
/// `refs/heads/main` gives `main`; a ref without any `/` is returned unchanged.
pub fn derive_branch(git_ref: &str) -> &str {
    git_ref.rsplit('/').next().unwrap_or(git_ref)
}
