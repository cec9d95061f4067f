//! # Version Control
//!
//! The `ExternalVcs` capability used by the publisher, and `GitCli`, its
//! production adapter. Repository inspection goes through `git2`; every
//! mutation and every `gh` call is a subprocess with a wall-clock bound.
//!
//! Pipeline code never spawns processes itself; tests substitute an
//! in-memory implementation.

use async_trait::async_trait;
use git2::{Repository, StatusOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::config::GitHubSettings;
use crate::error::VcsError;

/// Version-control and change-proposal operations
#[async_trait]
pub trait ExternalVcs: Send + Sync {
    /// Fail with `NotARepository` unless the working tree is a repository
    async fn ensure_repository(&self) -> Result<(), VcsError>;

    /// Whether tracked files have uncommitted changes, ignoring `exclude`
    /// (files or directories). Untracked files never count.
    async fn is_dirty(&self, exclude: &[PathBuf]) -> Result<bool, VcsError>;

    /// Short human-readable status
    async fn status_summary(&self) -> Result<String, VcsError>;

    /// Create `name` from the current HEAD and switch to it
    async fn create_branch(&self, name: &str) -> Result<(), VcsError>;

    /// Stage exactly these paths
    async fn stage(&self, files: &[PathBuf]) -> Result<(), VcsError>;

    /// Commit what is staged, returning the short commit id
    async fn commit(&self, message: &str) -> Result<String, VcsError>;

    /// Push `branch` to `remote` with upstream tracking
    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    /// Fail unless the change-proposal tool is installed and authenticated
    async fn check_proposal_tool(&self) -> Result<(), VcsError>;

    /// Open a change proposal, returning the tool's stdout
    async fn propose_change(&self, title: &str, body: &str, base: &str)
        -> Result<String, VcsError>;
}

/// `git` + `gh` adapter rooted at a working tree
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    command_timeout: Duration,
    check_timeout: Duration,
}

impl GitCli {
    pub fn from_settings(repo_path: impl Into<PathBuf>, settings: &GitHubSettings) -> Self {
        Self {
            repo_path: repo_path.into(),
            command_timeout: Duration::from_secs(settings.command_timeout_secs),
            check_timeout: Duration::from_secs(settings.check_timeout_secs),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        run_command(&self.repo_path, "git", args, self.command_timeout).await
    }

    async fn with_repo<T, F>(&self, f: F) -> Result<T, VcsError>
    where
        T: Send + 'static,
        F: FnOnce(Repository) -> Result<T, VcsError> + Send + 'static,
    {
        let path = self.repo_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::discover(&path)
                .map_err(|_| VcsError::NotARepository(path.display().to_string()))?;
            f(repo)
        })
        .await
        .map_err(|e| VcsError::CommandFailed {
            command: "git status".to_string(),
            message: e.to_string(),
        })?
    }
}

#[async_trait]
impl ExternalVcs for GitCli {
    async fn ensure_repository(&self) -> Result<(), VcsError> {
        self.with_repo(|repo| {
            if repo.is_bare() {
                return Err(VcsError::NotARepository(repo.path().display().to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn is_dirty(&self, exclude: &[PathBuf]) -> Result<bool, VcsError> {
        let base = self.repo_path.clone();
        let exclude = exclude.to_vec();
        self.with_repo(move |repo| {
            let workdir = repo
                .workdir()
                .map(Path::to_path_buf)
                .ok_or_else(|| VcsError::NotARepository(base.display().to_string()))?;
            let excluded: Vec<PathBuf> = exclude
                .iter()
                .filter_map(|p| relative_to_workdir(&workdir, &base, p))
                .collect();

            let mut options = StatusOptions::new();
            options.include_untracked(false).include_ignored(false);
            let statuses = repo.statuses(Some(&mut options))?;

            let dirty = statuses.iter().any(|entry| {
                entry
                    .path()
                    .map(Path::new)
                    .map_or(true, |path| !excluded.iter().any(|ex| path.starts_with(ex)))
            });
            Ok(dirty)
        })
        .await
    }

    async fn status_summary(&self) -> Result<String, VcsError> {
        self.git(&["status", "--short", "--branch"]).await
    }

    async fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        self.git(&["checkout", "-b", name]).await.map(|_| ())
    }

    async fn stage(&self, files: &[PathBuf]) -> Result<(), VcsError> {
        if files.is_empty() {
            return Err(VcsError::CommandFailed {
                command: "git add".to_string(),
                message: "no files to stage".to_string(),
            });
        }
        let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<String, VcsError> {
        self.git(&["commit", "-m", message]).await?;
        let hash = self.git(&["rev-parse", "--short=8", "HEAD"]).await?;
        Ok(hash.trim().to_string())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.git(&["push", "--set-upstream", remote, branch])
            .await
            .map(|_| ())
    }

    async fn check_proposal_tool(&self) -> Result<(), VcsError> {
        run_command(&self.repo_path, "gh", &["--version"], self.check_timeout)
            .await
            .map_err(|e| match e {
                VcsError::Io { .. } | VcsError::CommandFailed { .. } => VcsError::ToolMissing,
                other => other,
            })?;
        run_command(&self.repo_path, "gh", &["auth", "status"], self.check_timeout)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                VcsError::CommandFailed { .. } => VcsError::Unauthenticated,
                other => other,
            })
    }

    async fn propose_change(
        &self,
        title: &str,
        body: &str,
        base: &str,
    ) -> Result<String, VcsError> {
        run_command(
            &self.repo_path,
            "gh",
            &["pr", "create", "--base", base, "--title", title, "--body", body],
            self.command_timeout,
        )
        .await
    }
}

/// Express `path` relative to the repository workdir, if it lies inside it
fn relative_to_workdir(workdir: &Path, base: &Path, path: &Path) -> Option<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let resolved = std::fs::canonicalize(&joined).unwrap_or(joined);
    let workdir = std::fs::canonicalize(workdir).unwrap_or_else(|_| workdir.to_path_buf());
    resolved
        .strip_prefix(&workdir)
        .ok()
        .map(Path::to_path_buf)
}

/// Run a program with a wall-clock bound, returning stdout on success.
///
/// Expiry kills the child and yields `VcsError::Timeout`; a non-zero exit
/// yields `CommandFailed` carrying stderr (or stdout when stderr is empty).
pub async fn run_command(
    cwd: &Path,
    program: &str,
    args: &[&str],
    limit: Duration,
) -> Result<String, VcsError> {
    let command_line = describe(program, args);
    tracing::debug!(command = %command_line, "Running command");

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(limit, child).await {
        Err(_) => {
            tracing::warn!(command = %command_line, seconds = limit.as_secs(), "Command timed out");
            return Err(VcsError::Timeout {
                command: command_line,
                seconds: limit.as_secs(),
            });
        }
        Ok(Err(source)) => {
            return Err(VcsError::Io {
                command: command_line,
                source,
            })
        }
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        stdout.trim().to_string()
    } else {
        stderr
    };
    Err(VcsError::CommandFailed {
        command: command_line,
        message,
    })
}

/// Command name for messages, without free-text arguments
fn describe(program: &str, args: &[&str]) -> String {
    let words: Vec<&str> = std::iter::once(program)
        .chain(args.iter().copied().take_while(|a| !a.starts_with('-')))
        .take(3)
        .collect();
    words.join(" ")
}
