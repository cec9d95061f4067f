//! # Publisher
//!
//! Branch, commit, push and propose, each step gated on the previous one.
//! Any failure stops the sequence and is returned verbatim in a partially
//! populated `PublishOutcome`.
//!
//! The agent-mediated attempt drives the same steps through tools. When it
//! does not produce a proposal URL, the deterministic sequence resumes from
//! the first step the agent did not complete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::config::GitHubSettings;
use crate::error::VcsError;
use crate::models::TextGenerator;
use crate::naming;
use crate::schema::{PublishOutcome, TargetLanguage};
use crate::skills::publish_skill::TOOL_NAMES;
use crate::skills::{AgentTools, PublishAgent, ToolCall, ToolOutput};
use crate::tools::vcs::ExternalVcs;

use super::body::ProposalText;

/// What to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Feature label used in the branch, title and body
    pub feature: String,
    pub scenario_count: usize,
    /// Exact paths to stage, relative to the repository or absolute
    pub files: Vec<PathBuf>,
    pub base_branch: String,
}

/// Steps already completed on the current branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishProgress {
    pub branch: Option<String>,
    pub committed: bool,
    pub pushed: bool,
}

/// Everything the steps need, computed once per publish
#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub branch_name: String,
    pub text: ProposalText,
    pub files: Vec<PathBuf>,
    pub base_branch: String,
}

impl PublishPlan {
    fn file_labels(&self) -> Vec<String> {
        self.files.iter().map(|p| p.display().to_string()).collect()
    }

    fn outcome(&self) -> PublishOutcome {
        let mut outcome = PublishOutcome::pending(&self.base_branch, &self.file_labels());
        outcome.branch_name = self.branch_name.clone();
        outcome.proposal_title = self.text.title.clone();
        outcome.proposal_body = self.text.body.clone();
        outcome
    }
}

pub struct Publisher<'a> {
    vcs: &'a dyn ExternalVcs,
    settings: &'a GitHubSettings,
    language: TargetLanguage,
    timestamp: Option<DateTime<Utc>>,
}

impl<'a> Publisher<'a> {
    pub fn new(vcs: &'a dyn ExternalVcs, settings: &'a GitHubSettings) -> Self {
        Self {
            vcs,
            settings,
            language: TargetLanguage::default(),
            timestamp: None,
        }
    }

    pub fn with_language(mut self, language: TargetLanguage) -> Self {
        self.language = language;
        self
    }

    /// Fix the branch timestamp instead of reading the clock
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn plan(&self, request: &PublishRequest) -> PublishPlan {
        let at = self.timestamp.unwrap_or_else(Utc::now);
        let files: Vec<String> = request.files.iter().map(|p| p.display().to_string()).collect();
        PublishPlan {
            branch_name: naming::branch_name(&self.settings.branch_prefix, &request.feature, at),
            text: ProposalText::new(
                &self.settings.pr_title_prefix,
                &request.feature,
                request.scenario_count,
                &files,
                self.language,
            ),
            files: request.files.clone(),
            base_branch: request.base_branch.clone(),
        }
    }

    /// Run the full deterministic sequence
    pub async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        let plan = self.plan(request);
        self.resume(&plan, &PublishProgress::default()).await
    }

    /// Run the deterministic sequence, skipping steps recorded in `progress`.
    /// The repository check always runs.
    #[tracing::instrument(skip(self, plan), fields(branch = %plan.branch_name))]
    pub async fn resume(&self, plan: &PublishPlan, progress: &PublishProgress) -> PublishOutcome {
        let mut outcome = plan.outcome();
        if let Some(branch) = &progress.branch {
            outcome.branch_name = branch.clone();
        }

        match self.run_steps(plan, progress).await {
            Ok(url) => {
                tracing::info!(url = %url, "Change proposal created");
                outcome.succeeded(&url)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Publishing failed");
                outcome.failed(e.to_string())
            }
        }
    }

    async fn run_steps(
        &self,
        plan: &PublishPlan,
        progress: &PublishProgress,
    ) -> Result<String, VcsError> {
        self.check_repository().await?;

        let branch = match &progress.branch {
            Some(branch) => branch.clone(),
            None => {
                self.create_branch(plan).await?;
                plan.branch_name.clone()
            }
        };
        if !progress.committed {
            self.commit(plan).await?;
        }
        if !progress.pushed {
            self.push(&branch).await?;
        }
        self.propose(plan).await
    }

    async fn check_repository(&self) -> Result<(), VcsError> {
        self.vcs.ensure_repository().await
    }

    async fn create_branch(&self, plan: &PublishPlan) -> Result<(), VcsError> {
        if self.vcs.is_dirty(&plan.files).await? {
            return Err(VcsError::DirtyTree);
        }
        self.vcs.create_branch(&plan.branch_name).await?;
        tracing::info!(branch = %plan.branch_name, "Branch created");
        Ok(())
    }

    async fn commit(&self, plan: &PublishPlan) -> Result<String, VcsError> {
        self.vcs.stage(&plan.files).await?;
        let hash = self.vcs.commit(&plan.text.commit_message).await?;
        tracing::info!(commit = %hash, files = plan.files.len(), "Files committed");
        Ok(hash)
    }

    async fn push(&self, branch: &str) -> Result<(), VcsError> {
        self.vcs.push(&self.settings.remote, branch).await?;
        tracing::info!(remote = %self.settings.remote, branch, "Branch pushed");
        Ok(())
    }

    async fn propose(&self, plan: &PublishPlan) -> Result<String, VcsError> {
        self.vcs.check_proposal_tool().await?;
        let stdout = self
            .vcs
            .propose_change(&plan.text.title, &plan.text.body, &plan.base_branch)
            .await?;
        naming::find_proposal_url(&stdout).ok_or_else(|| VcsError::CommandFailed {
            command: "gh pr create".to_string(),
            message: format!("no pull request URL in output: {}", stdout.trim()),
        })
    }

    /// Let the agent try first, then fall back to the deterministic sequence
    pub async fn publish_with_agent(
        &self,
        generator: &dyn TextGenerator,
        max_turns: usize,
        request: &PublishRequest,
    ) -> PublishOutcome {
        let plan = self.plan(request);
        let mut tools = PlanTools::new(self, &plan);
        let report = PublishAgent::new(generator, max_turns)
            .run(&agent_task(&plan, request), &mut tools)
            .await;

        if let Some(url) = tools.url.clone() {
            tracing::info!(url = %url, turns = report.turns, "Agent created change proposal");
            return plan.outcome().succeeded(&url);
        }

        let progress = tools.progress;
        tracing::info!(
            turns = report.turns,
            tool_calls = report.tool_calls,
            branch = ?progress.branch,
            committed = progress.committed,
            pushed = progress.pushed,
            "Agent did not create a change proposal, falling back"
        );
        self.resume(&plan, &progress).await
    }
}

fn agent_task(plan: &PublishPlan, request: &PublishRequest) -> String {
    let files = plan
        .file_labels()
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Publish the generated tests for feature \"{}\".\n\n## Files\n{}\n\n## Branch\n{}\n\n## Commit message\n{}\n\n## Pull request\nTitle: {}\nBase: {}\n\nStart with check_git_status.",
        request.feature,
        files,
        plan.branch_name,
        plan.text.commit_message,
        plan.text.title,
        plan.base_branch
    )
}

/// Agent tools bound to one plan. Tools always act on the planned branch,
/// files, message, title and body; call arguments are ignored.
struct PlanTools<'p, 'a> {
    publisher: &'p Publisher<'a>,
    plan: &'p PublishPlan,
    progress: PublishProgress,
    url: Option<String>,
}

impl<'p, 'a> PlanTools<'p, 'a> {
    fn new(publisher: &'p Publisher<'a>, plan: &'p PublishPlan) -> Self {
        Self {
            publisher,
            plan,
            progress: PublishProgress::default(),
            url: None,
        }
    }

    async fn execute(&mut self, tool: &str) -> Result<String, VcsError> {
        match tool {
            "check_git_status" => {
                self.publisher.check_repository().await?;
                self.publisher.vcs.status_summary().await
            }
            "create_branch" => {
                if let Some(branch) = &self.progress.branch {
                    return Ok(format!("already on {}", branch));
                }
                self.publisher.create_branch(self.plan).await?;
                self.progress.branch = Some(self.plan.branch_name.clone());
                Ok(format!("created and switched to {}", self.plan.branch_name))
            }
            "commit_files" => {
                if self.progress.branch.is_none() {
                    return Ok("create the branch first".to_string());
                }
                if self.progress.committed {
                    return Ok("files already committed".to_string());
                }
                let hash = self.publisher.commit(self.plan).await?;
                self.progress.committed = true;
                Ok(format!("committed {} file(s) as {}", self.plan.files.len(), hash))
            }
            "push_branch" => {
                let Some(branch) = self.progress.branch.clone() else {
                    return Ok("create the branch first".to_string());
                };
                if !self.progress.committed {
                    return Ok("commit the files first".to_string());
                }
                self.publisher.push(&branch).await?;
                self.progress.pushed = true;
                Ok(format!("pushed {}", branch))
            }
            "create_pull_request" => {
                if !self.progress.pushed {
                    return Ok("push the branch first".to_string());
                }
                let url = self.publisher.propose(self.plan).await?;
                self.url = Some(url.clone());
                Ok(format!("pull request created: {}", url))
            }
            other => Ok(format!(
                "unknown tool '{}'; available: {}",
                other,
                TOOL_NAMES.join(", ")
            )),
        }
    }
}

#[async_trait]
impl<'p, 'a> AgentTools for PlanTools<'p, 'a> {
    async fn call(&mut self, call: &ToolCall) -> ToolOutput {
        match self.execute(&call.tool).await {
            Ok(output) => ToolOutput::ok(output),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    fn done(&self) -> bool {
        self.url.is_some()
    }
}
