pub mod api;
pub mod error;
pub mod execution;
pub mod logging;
pub mod reload;
#[cfg(test)]
mod test_utils;
pub mod utils;
pub mod webhook;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, WebhookError};

/// Branch a rule listens on when its `Branch` is left empty.
pub const DEFAULT_BRANCH: &str = "master";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(rename = "Logfile", alias = "logfile")]
    pub log_file: String,
    #[serde(rename = "execToStd", alias = "exectostd")]
    pub exec_to_std: bool,
    #[serde(rename = "Address", alias = "address")]
    pub address: String,
    #[serde(rename = "Port", alias = "port")]
    pub port: u16,
    #[serde(rename = "Repositories", alias = "repositories")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Commands", alias = "commands")]
    pub commands: Vec<String>,
    /// Run each command in the background instead of inline.
    #[serde(rename = "Long", alias = "long")]
    pub detached: bool,
    #[serde(rename = "Branch", alias = "branch")]
    pub branch: String,
}

impl ServerConfig {
    /// Returns the `host:port` pair the server binds to.
    /// An empty address listens on every interface.
    pub fn listen_address(&self) -> String {
        let host = if self.address.is_empty() {
            "0.0.0.0"
        } else {
            self.address.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

impl RuleConfig {
    /// Branch this rule listens on, with the empty value read as [`DEFAULT_BRANCH`].
    /// The stored `branch` is left untouched.
    pub fn effective_branch(&self) -> &str {
        if self.branch.is_empty() {
            DEFAULT_BRANCH
        } else {
            &self.branch
        }
    }

    /// Returns true if a push of `branch` to repository `repo_name` triggers this rule.
    pub fn matches(&self, repo_name: &str, branch: &str) -> bool {
        self.name == repo_name && self.effective_branch() == branch
    }
}

fn parse_config(path: &Path, config_str: &str) -> Result<ServerConfig> {
    serde_json::from_str(config_str).map_err(|e| {
        WebhookError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load and parse the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        WebhookError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_config(path, &config_str)
}

/// Re-read the configuration file without blocking the runtime.
pub async fn reload_config(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
        WebhookError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_config(path, &config_str)
}

/// Holds the active configuration as an immutable snapshot.
///
/// Readers take a clone of the `Arc` and keep a consistent view for as long as
/// they need it; [`ConfigStore::replace`] swaps in a whole new snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<ServerConfig>>,
}

impl ConfigStore {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn current(&self) -> Arc<ServerConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Swap in `config`, returning the snapshot it replaced.
    pub fn replace(&self, config: ServerConfig) -> Arc<ServerConfig> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}

pub struct AppState {
    pub config: ConfigStore,
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(config: ServerConfig, config_path: impl Into<PathBuf>) -> Self {
        Self {
            config: ConfigStore::new(config),
            config_path: config_path.into(),
        }
    }
}

pub type SharedState = Arc<AppState>;
