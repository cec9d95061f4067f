//! # Settings
//!
//! One explicit configuration object, built once at process start and
//! handed to every component constructor.
//!
//! Layering: defaults, then an optional JSON file, then environment
//! variables. Command-line flags are applied last by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::ModelConfig;

/// Config file looked up when no explicit path is given
pub const DEFAULT_CONFIG_PATH: &str = ".testsmith/config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub model: ModelConfig,
    pub github: GitHubSettings,
    pub output: OutputSettings,
    pub publish: PublishSettings,
}

/// Version-control and change-proposal settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitHubSettings {
    pub base_branch: String,
    pub branch_prefix: String,
    pub pr_title_prefix: String,
    pub remote: String,
    /// Bound on branch/commit/push/propose subprocesses
    pub command_timeout_secs: u64,
    /// Bound on `gh --version` / `gh auth status` checks
    pub check_timeout_secs: u64,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            branch_prefix: "test/auto-generated".to_string(),
            pr_title_prefix: "[Auto-Generated] ".to_string(),
            remote: "origin".to_string(),
            command_timeout_secs: 60,
            check_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub output_dir: PathBuf,
    /// Persist a companion file (e.g. `conftest.py`) when the review supplies one
    pub generate_companion: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output/generated_tests"),
            generate_companion: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishSettings {
    /// Try the agent-mediated publish before the deterministic sequence
    pub use_agent: bool,
    pub agent_max_turns: usize,
    /// Publish even when an artifact failed syntax validation
    pub allow_invalid: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            use_agent: true,
            agent_max_turns: 6,
            allow_invalid: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load from `path` if given, else from `.testsmith/config.json` if it
    /// exists, else defaults. An explicit path that cannot be read is an error.
    pub async fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if tokio::fs::metadata(default_path).await.is_ok() {
                    Self::load(default_path).await
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply `TESTSMITH_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = non_empty("TESTSMITH_PROVIDER") {
            self.model.provider = provider
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid TESTSMITH_PROVIDER")?;
        }
        if let Some(model) = non_empty("TESTSMITH_MODEL") {
            self.model.model = model;
        }
        if let Some(base_url) = non_empty("TESTSMITH_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
        if let Some(base_branch) = non_empty("TESTSMITH_BASE_BRANCH") {
            self.github.base_branch = base_branch;
        }
        Ok(())
    }
}
