//! # Pipeline Orchestrator
//!
//! Runs interpret, design, synthesize and validate in order, each stage
//! receiving the previous stage's full text. The validate output goes to
//! the extractor and the syntax validator; the artifact is saved and,
//! when requested, published.
//!
//! Stage failures halt the run with no artifact. Extraction and validation
//! problems are warnings: the artifact is still saved for a human to fix.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::{Interrupted, StageError};
use crate::extract::extract_artifact;
use crate::models::TextGenerator;
use crate::naming;
use crate::publish::{PublishRequest, Publisher};
use crate::schema::{
    CompanionFile, GeneratedArtifact, PublishOutcome, TargetLanguage, WorkflowResult,
};
use crate::skills::{
    DesignSkill, InterpretSkill, ReviewSkill, StageRunner, StageSkill, SynthesizeSkill,
};
use crate::storage::{save_artifact, Storage};
use crate::tools::syntax::{validator_for, SyntaxValidator};
use crate::tools::vcs::ExternalVcs;

use super::events::{WorkflowEvent, WorkflowEventKind};
use super::pipeline::{Pipeline, Stage};

/// Note attached to every generated artifact
pub const GENERATED_NOTE: &str = "Generated by testsmith";

/// Scenario text to saved (and optionally published) test file
pub struct TestGenerator {
    generator: Arc<dyn TextGenerator>,
    storage: Arc<dyn Storage>,
    vcs: Arc<dyn ExternalVcs>,
    validator: Box<dyn SyntaxValidator>,
    settings: Settings,
    language: TargetLanguage,
    events: Vec<WorkflowEvent>,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl TestGenerator {
    pub fn new(
        settings: Settings,
        generator: Arc<dyn TextGenerator>,
        storage: Arc<dyn Storage>,
        vcs: Arc<dyn ExternalVcs>,
    ) -> Self {
        let language = TargetLanguage::default();
        Self {
            generator,
            storage,
            vcs,
            validator: validator_for(language),
            settings,
            language,
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn SyntaxValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Events emitted so far
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    async fn emit(&mut self, event: WorkflowEvent) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Read a scenario file through storage and run the pipeline on it
    pub async fn generate_from_file(
        &mut self,
        input: &Path,
        publish_to: Option<&str>,
    ) -> WorkflowResult {
        let source = input.display().to_string();
        let text = match self.storage.read(input).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                let mut result = WorkflowResult::new(&source, 0);
                result.fail(format!("Could not read file: {}", source));
                return result;
            }
            Err(e) => {
                let mut result = WorkflowResult::new(&source, 0);
                result.fail(format!("Could not read file: {}", e));
                return result;
            }
        };
        self.generate_tests(&text, &source, publish_to).await
    }

    /// Run the four stages on `scenario_text`, save the artifact and, when
    /// `publish_to` names a base branch, publish it.
    #[tracing::instrument(skip(self, scenario_text), fields(feature = %naming::feature_label(scenario_text)))]
    pub async fn generate_tests(
        &mut self,
        scenario_text: &str,
        source_identifier: &str,
        publish_to: Option<&str>,
    ) -> WorkflowResult {
        let mut result = WorkflowResult::new(source_identifier, 1);
        self.emit(WorkflowEvent::new(WorkflowEventKind::PipelineStarted)).await;

        if scenario_text.trim().is_empty() {
            result.fail("stage interpret failed: scenario text is empty");
            self.emit(WorkflowEvent::new(WorkflowEventKind::PipelineFailed)).await;
            return result;
        }

        let final_output = match self.run_stages(scenario_text, &mut result).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(stage = %e.stage(), error = %e, "Pipeline failed");
                result.fail(e.to_string());
                self.emit(
                    WorkflowEvent::for_stage(WorkflowEventKind::PipelineFailed, e.stage())
                        .with_data(serde_json::json!({ "error": e.to_string() })),
                )
                .await;
                return result;
            }
        };

        let artifact = self.build_artifact(scenario_text, &final_output, &mut result);
        self.emit(
            WorkflowEvent::new(WorkflowEventKind::ArtifactExtracted).with_data(serde_json::json!({
                "file_name": artifact.file_name,
                "valid": artifact.is_syntactically_valid,
            })),
        )
        .await;

        let saved = match save_artifact(
            self.storage.as_ref(),
            &self.settings.output.output_dir,
            &artifact,
        )
        .await
        {
            Ok(paths) => {
                tracing::info!(files = ?paths, "Artifact saved");
                self.emit(
                    WorkflowEvent::new(WorkflowEventKind::ArtifactSaved)
                        .with_data(serde_json::json!({ "files": paths })),
                )
                .await;
                Some(paths)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save artifact");
                result.fail(format!("Failed to save {}: {}", artifact.file_name, e));
                None
            }
        };

        let all_valid = artifact.all_valid();
        result.artifacts.push(artifact);

        if let (Some(base_branch), Some(files)) = (publish_to, saved) {
            let feature = naming::feature_label(scenario_text);
            let outcome = self
                .publish(&feature, result.scenario_count, files, base_branch, all_valid)
                .await;
            if let Some(error) = &outcome.error_message {
                result.warn(format!("Publishing failed: {}", error));
            }
            result.publish = Some(outcome);
        }

        let kind = if result.success {
            WorkflowEventKind::PipelineCompleted
        } else {
            WorkflowEventKind::PipelineFailed
        };
        self.emit(WorkflowEvent::new(kind)).await;
        result
    }

    async fn run_stages(
        &mut self,
        scenario_text: &str,
        result: &mut WorkflowResult,
    ) -> Result<String, StageError> {
        let generator = Arc::clone(&self.generator);
        let runner = StageRunner::new(generator.as_ref());
        let mut pipeline = Pipeline::new();
        let mut upstream = scenario_text.to_string();

        while let Some(stage) = pipeline.current() {
            self.emit(WorkflowEvent::for_stage(WorkflowEventKind::StageStarted, stage))
                .await;
            tracing::info!(%stage, "Stage started");

            let skill = self.skill_for(stage);
            let checked = match runner.run(skill.as_ref(), &upstream).await {
                Ok(output) => check_stage_output(stage, &output, result).map(|_| output),
                Err(e) => Err(e),
            };

            match checked {
                Ok(output) => {
                    self.emit(
                        WorkflowEvent::for_stage(WorkflowEventKind::StageCompleted, stage)
                            .with_data(serde_json::json!({ "chars": output.len() })),
                    )
                    .await;
                    upstream = output;
                    pipeline.advance();
                }
                Err(e) => {
                    pipeline.fail();
                    self.emit(
                        WorkflowEvent::for_stage(WorkflowEventKind::StageFailed, stage)
                            .with_data(serde_json::json!({ "error": e.to_string() })),
                    )
                    .await;
                    return Err(e);
                }
            }
        }

        Ok(upstream)
    }

    fn skill_for(&self, stage: Stage) -> Box<dyn StageSkill> {
        match stage {
            Stage::Interpret => Box::new(InterpretSkill::new()),
            Stage::Design => Box::new(DesignSkill::new()),
            Stage::Synthesize => Box::new(SynthesizeSkill::new(self.language)),
            Stage::Validate => Box::new(ReviewSkill::new()),
        }
    }

    fn build_artifact(
        &self,
        scenario_text: &str,
        final_output: &str,
        result: &mut WorkflowResult,
    ) -> GeneratedArtifact {
        let file_name = naming::test_file_name(scenario_text, self.language);
        let review = ReviewSkill::decode(final_output);
        let mut notes = review.as_ref().map(|r| r.notes()).unwrap_or_default();
        notes.push(GENERATED_NOTE.to_string());

        let (source_text, is_valid) = match extract_artifact(final_output, self.language) {
            Some(extraction) => {
                tracing::info!(strategy = extraction.strategy, file = %file_name, "Code extracted");
                let valid = self.validator.validate(&extraction.code);
                if !valid {
                    let issues = self.validator.issues(&extraction.code);
                    tracing::warn!(file = %file_name, issues = issues.len(), "Generated code has syntax errors");
                    result.warn(format!("Generated code in {} has syntax errors", file_name));
                    notes.extend(issues.iter().map(|i| i.to_string()));
                }
                (extraction.code, valid)
            }
            None => {
                tracing::warn!(file = %file_name, "No code found in final stage output");
                result.warn(format!(
                    "Could not extract code for {}; saved the raw response for manual repair",
                    file_name
                ));
                (final_output.trim().to_string(), false)
            }
        };

        let companion = review
            .as_ref()
            .filter(|_| self.settings.output.generate_companion)
            .and_then(|r| r.companion())
            .filter(|(name, _)| *name != file_name)
            .map(|(name, code)| {
                let valid = self.validator.validate(&code);
                if !valid {
                    result.warn(format!("Companion file {} has syntax errors", name));
                }
                CompanionFile {
                    file_name: name,
                    source_text: code,
                    is_syntactically_valid: valid,
                }
            });

        GeneratedArtifact {
            file_name,
            source_text,
            artifact_count: 1 + usize::from(companion.is_some()),
            is_syntactically_valid: is_valid,
            review_notes: notes,
            companion,
        }
    }

    async fn publish(
        &mut self,
        feature: &str,
        scenario_count: usize,
        files: Vec<PathBuf>,
        base_branch: &str,
        all_valid: bool,
    ) -> PublishOutcome {
        let labels: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        if !all_valid && !self.settings.publish.allow_invalid {
            tracing::warn!("Skipping publish: generated code has syntax errors");
            return PublishOutcome::pending(base_branch, &labels).failed(
                "Publishing skipped: generated code has syntax errors (set allow_invalid to override)",
            );
        }

        self.emit(WorkflowEvent::new(WorkflowEventKind::PublishStarted))
            .await;
        let request = PublishRequest {
            feature: feature.to_string(),
            scenario_count,
            files,
            base_branch: base_branch.to_string(),
        };
        let publisher =
            Publisher::new(self.vcs.as_ref(), &self.settings.github).with_language(self.language);

        let outcome = if self.settings.publish.use_agent {
            publisher
                .publish_with_agent(
                    self.generator.as_ref(),
                    self.settings.publish.agent_max_turns,
                    &request,
                )
                .await
        } else {
            publisher.publish(&request).await
        };

        let kind = if outcome.success {
            WorkflowEventKind::PublishCompleted
        } else {
            WorkflowEventKind::PublishFailed
        };
        self.emit(WorkflowEvent::new(kind).with_data(serde_json::json!({
            "url": outcome.url,
            "error": outcome.error_message,
        })))
        .await;
        outcome
    }
}

/// Structural checks on a stage's output beyond "non-empty"
fn check_stage_output(
    stage: Stage,
    output: &str,
    result: &mut WorkflowResult,
) -> Result<(), StageError> {
    match stage {
        Stage::Interpret => match InterpretSkill::decode(output) {
            Some(scenario) if scenario.steps.is_empty() => Err(StageError::Schema {
                stage,
                reason: "scenario has no steps".to_string(),
            }),
            Some(scenario) => {
                tracing::info!(
                    feature = %scenario.feature_name,
                    scenario = %scenario.scenario_name,
                    steps = scenario.steps.len(),
                    "Scenario interpreted"
                );
                Ok(())
            }
            None => {
                result.warn("Interpreted scenario is not structured JSON; continuing with text");
                Ok(())
            }
        },
        Stage::Design => {
            match DesignSkill::decode(output) {
                Some(blueprint) => tracing::info!(
                    class = %blueprint.class_name,
                    method = %blueprint.method_name,
                    assertions = blueprint.assertions.len(),
                    "Blueprint designed"
                ),
                None => result.warn("Test blueprint is not structured JSON; continuing with text"),
            }
            Ok(())
        }
        Stage::Synthesize | Stage::Validate => Ok(()),
    }
}

/// Drive `work` to completion unless `interrupt` resolves first.
///
/// Dropping `work` cancels whatever stage or command is in flight; partial
/// output files already written are left on disk.
pub async fn run_until_interrupted<T, W, I>(work: W, interrupt: I) -> Result<T, Interrupted>
where
    W: Future<Output = T>,
    I: Future,
{
    tokio::select! {
        output = work => Ok(output),
        _ = interrupt => {
            tracing::warn!("Interrupted, abandoning run");
            Err(Interrupted)
        }
    }
}
