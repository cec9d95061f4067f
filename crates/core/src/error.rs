//! # Error Taxonomy
//!
//! Typed errors for every seam of the pipeline. Stage and extraction
//! problems end up as strings in a `WorkflowResult`; version-control
//! errors end up verbatim in a `PublishOutcome`. Only the CLI turns
//! anything into a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::Stage;

/// Errors from a text-generation backend
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Serialization(err.to_string())
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

/// A pipeline stage that did not produce usable output
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage {stage} failed: empty response")]
    EmptyResponse { stage: Stage },
    #[error("stage {stage} failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: LlmError,
    },
    #[error("stage {stage} failed: {reason}")]
    Schema { stage: Stage, reason: String },
}

impl StageError {
    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            StageError::EmptyResponse { stage }
            | StageError::Generation { stage, .. }
            | StageError::Schema { stage, .. } => *stage,
        }
    }
}

/// Version-control and change-proposal failures
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Not a Git repository: {0}")]
    NotARepository(String),
    #[error("Repository has uncommitted changes. Please commit or stash them first.")]
    DirtyTree,
    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
    #[error("`{command}` failed: {message}")]
    CommandFailed { command: String, message: String },
    #[error("GitHub CLI (gh) is not installed")]
    ToolMissing,
    #[error("GitHub CLI is not authenticated. Run: gh auth login")]
    Unauthenticated,
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Storage collaborator failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to {action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The run was cancelled by an external interrupt
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("interrupted")]
pub struct Interrupted;
