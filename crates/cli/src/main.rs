//! testsmith CLI
//!
//! Generates a pytest module from a scenario file and optionally opens a
//! pull request with it.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use testsmith_core::config::Settings;
use testsmith_core::models::{LlmProvider, OllamaClient};
use testsmith_core::schema::{TargetLanguage, WorkflowResult};
use testsmith_core::storage::FsStorage;
use testsmith_core::tools::vcs::{ExternalVcs, GitCli};
use testsmith_core::workflow::{run_until_interrupted, TestGenerator};

/// Exit code for a run cancelled with Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "testsmith - turn test scenarios into pytest modules")]
struct Args {
    /// Scenario file to generate tests from
    #[arg(short, long)]
    input: PathBuf,
    /// Directory for generated test files
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Open a pull request with the generated files
    #[arg(long)]
    push_pr: bool,
    /// Branch the pull request targets
    #[arg(long)]
    base_branch: Option<String>,
    /// Model name
    #[arg(long)]
    model: Option<String>,
    /// Text-generation provider (ollama or openai)
    #[arg(long)]
    provider: Option<String>,
    /// Provider base URL
    #[arg(long)]
    base_url: Option<String>,
    /// Settings file (defaults to .testsmith/config.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Publish even when generated code has syntax errors
    #[arg(long)]
    allow_invalid: bool,
    /// Skip the agent and publish with the fixed git sequence
    #[arg(long)]
    no_agent: bool,
    /// Skip the model server and GitHub prerequisite checks
    #[arg(long)]
    skip_checks: bool,
    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Fold command-line overrides into settings loaded from file and env
    fn apply_to(&self, settings: &mut Settings) -> Result<()> {
        if let Some(provider) = &self.provider {
            settings.model.provider = provider
                .parse::<LlmProvider>()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(model) = &self.model {
            settings.model.model = model.clone();
        }
        if let Some(url) = &self.base_url {
            settings.model.base_url = Some(url.clone());
        }
        if let Some(branch) = &self.base_branch {
            settings.github.base_branch = branch.clone();
        }
        if let Some(output) = &self.output {
            settings.output.output_dir = output.clone();
        }
        if self.allow_invalid {
            settings.publish.allow_invalid = true;
        }
        if self.no_agent {
            settings.publish.use_agent = false;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _ = dotenvy::dotenv();
    init_tracing(args.quiet);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let fallback = if quiet { "warn" } else { "testsmith_core=info,testsmith=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut settings = Settings::discover(args.config.as_deref()).await?;
    settings.apply_env()?;
    args.apply_to(&mut settings)?;

    if !args.input.is_file() {
        eprintln!("❌ Input file not found: {}", args.input.display());
        return Ok(ExitCode::FAILURE);
    }

    let vcs = Arc::new(GitCli::from_settings(".", &settings.github));

    if !args.skip_checks {
        if let Err(e) = check_prerequisites(&settings, vcs.as_ref(), args.push_pr).await {
            eprintln!("❌ {:#}", e);
            eprintln!("   Use --skip-checks to bypass.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let generator = settings
        .model
        .create_client()
        .context("failed to create text-generation client")?;
    let output_dir = settings.output.output_dir.clone();
    let publish_to = args.push_pr.then(|| settings.github.base_branch.clone());

    tracing::info!(
        input = %args.input.display(),
        provider = %settings.model.provider.display_name(),
        model = %settings.model.model,
        publish = args.push_pr,
        "Starting generation"
    );

    let mut orchestrator = TestGenerator::new(
        settings,
        Arc::from(generator),
        Arc::new(FsStorage::current_dir()),
        vcs,
    );

    let work = orchestrator.generate_from_file(&args.input, publish_to.as_deref());
    let result = match run_until_interrupted(work, tokio::signal::ctrl_c()).await {
        Ok(result) => result,
        Err(_) => {
            eprintln!("\n⚠️  Interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_summary(&result, &output_dir));
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Model server reachable and model pulled; for publishing, a repository
/// and an authenticated GitHub CLI.
async fn check_prerequisites(
    settings: &Settings,
    vcs: &dyn ExternalVcs,
    publishing: bool,
) -> Result<()> {
    match settings.model.provider {
        LlmProvider::Ollama => {
            let client = OllamaClient::new(&settings.model)?;
            if !client.health().await {
                anyhow::bail!(
                    "Ollama is not reachable at {}. Start it with: ollama serve",
                    settings.model.resolved_base_url()
                );
            }
            if !client.model_available().await? {
                anyhow::bail!(
                    "Model '{}' is not available. Pull it with: ollama pull {}",
                    client.model(),
                    client.model()
                );
            }
        }
        LlmProvider::OpenAI => {
            if std::env::var("OPENAI_API_KEY").map_or(true, |k| k.trim().is_empty()) {
                anyhow::bail!("OPENAI_API_KEY is not set");
            }
        }
    }

    if publishing {
        vcs.ensure_repository().await?;
        vcs.check_proposal_tool().await?;
    }
    Ok(())
}

/// Human-readable report of a finished run
fn render_summary(result: &WorkflowResult, output_dir: &Path) -> String {
    let mut out = String::new();
    let line = "=".repeat(50);
    out.push_str(&format!("\n{}\n", line));

    if result.success {
        out.push_str("✅ Test generation complete!\n");
    } else {
        out.push_str("❌ Test generation failed\n");
    }
    out.push_str(&format!("   Source: {}\n", result.source_identifier));

    for artifact in &result.artifacts {
        out.push_str(&format!(
            "   {} {}\n",
            mark(artifact.is_syntactically_valid),
            output_dir.join(&artifact.file_name).display()
        ));
        if let Some(companion) = &artifact.companion {
            out.push_str(&format!(
                "   {} {}\n",
                mark(companion.is_syntactically_valid),
                output_dir.join(&companion.file_name).display()
            ));
        }
    }

    for warning in &result.warnings {
        out.push_str(&format!("   ⚠️  {}\n", warning));
    }
    for error in &result.errors {
        out.push_str(&format!("   ❌ {}\n", error));
    }

    if let Some(publish) = &result.publish {
        match (&publish.url, &publish.error_message) {
            (Some(url), _) if publish.success => {
                out.push_str(&format!("\n🔗 Pull request: {}\n", url));
                out.push_str(&format!("   Branch: {}\n", publish.branch_name));
            }
            (_, Some(error)) => out.push_str(&format!("\n⚠️  PR creation failed: {}\n", error)),
            _ => out.push_str("\n⚠️  PR creation failed\n"),
        }
    }

    if !result.artifacts.is_empty() {
        let dir = format!("{}/", output_dir.display());
        out.push_str(&format!(
            "\nRun tests with:\n   {}\n",
            TargetLanguage::default().run_hint(&[dir])
        ));
    }
    out.push_str(&format!("{}\n", line));
    out
}

fn mark(valid: bool) -> &'static str {
    if valid {
        "✓"
    } else {
        "⚠"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testsmith_core::schema::{CompanionFile, GeneratedArtifact, PublishOutcome};

    fn artifact(valid: bool) -> GeneratedArtifact {
        GeneratedArtifact {
            file_name: "test_login.py".to_string(),
            source_text: "def test_a():\n    pass\n".to_string(),
            artifact_count: 2,
            is_syntactically_valid: valid,
            review_notes: vec!["Generated by testsmith".to_string()],
            companion: Some(CompanionFile {
                file_name: "conftest.py".to_string(),
                source_text: "import pytest\n".to_string(),
                is_syntactically_valid: true,
            }),
        }
    }

    #[test]
    fn test_flags_override_settings() {
        let args = Args::parse_from([
            "testsmith",
            "--input",
            "login.txt",
            "--provider",
            "openai",
            "--model",
            "gpt-4o-mini",
            "--base-branch",
            "develop",
            "--output",
            "tests/generated",
            "--no-agent",
            "--allow-invalid",
        ]);
        let mut settings = Settings::default();
        args.apply_to(&mut settings).unwrap();

        assert_eq!(settings.model.provider, LlmProvider::OpenAI);
        assert_eq!(settings.model.model, "gpt-4o-mini");
        assert_eq!(settings.github.base_branch, "develop");
        assert_eq!(settings.output.output_dir, PathBuf::from("tests/generated"));
        assert!(!settings.publish.use_agent);
        assert!(settings.publish.allow_invalid);
    }

    #[test]
    fn test_unset_flags_keep_settings() {
        let args = Args::parse_from(["testsmith", "-i", "login.txt"]);
        let mut settings = Settings::default();
        args.apply_to(&mut settings).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let args = Args::parse_from(["testsmith", "-i", "a.txt", "--provider", "bard"]);
        assert!(args.apply_to(&mut Settings::default()).is_err());
    }

    #[test]
    fn test_summary_marks_validity_and_run_hint() {
        let mut result = WorkflowResult::new("login.txt", 1);
        result.artifacts.push(artifact(false));
        result.warn("Generated code in test_login.py has syntax errors");

        let summary = render_summary(&result, Path::new("out"));
        assert!(summary.contains("⚠ out/test_login.py"));
        assert!(summary.contains("✓ out/conftest.py"));
        assert!(summary.contains("pytest out/ -v"));
    }

    #[test]
    fn test_summary_reports_publish_failure() {
        let mut result = WorkflowResult::new("login.txt", 1);
        result.artifacts.push(artifact(true));
        result.publish = Some(
            PublishOutcome::pending("main", &["out/test_login.py".to_string()])
                .failed("GitHub CLI (gh) is not installed"),
        );

        let summary = render_summary(&result, Path::new("out"));
        assert!(summary.contains("✅ Test generation complete!"));
        assert!(summary.contains("PR creation failed: GitHub CLI (gh) is not installed"));
    }

    #[test]
    fn test_summary_of_failed_run_has_no_run_hint() {
        let mut result = WorkflowResult::new("login.txt", 1);
        result.fail("stage design failed: empty response");

        let summary = render_summary(&result, Path::new("out"));
        assert!(summary.contains("❌ stage design failed: empty response"));
        assert!(!summary.contains("pytest"));
    }
}
