//! # Schema
//!
//! Typed records that flow through a run: the interpreted scenario, the
//! test blueprint, the generated artifact, the publish outcome, and the
//! aggregate `WorkflowResult` handed back to the caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::naming;

/// Language the generated tests are written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Python,
}

impl TargetLanguage {
    /// Source file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "py",
        }
    }

    /// Tags accepted on a fenced code block for this language
    pub fn fence_tags(&self) -> &'static [&'static str] {
        match self {
            TargetLanguage::Python => &["python", "py"],
        }
    }

    /// Tokens that identify test-framework code in free text
    pub fn framework_markers(&self) -> &'static [&'static str] {
        match self {
            TargetLanguage::Python => &["import pytest", "def test_"],
        }
    }

    /// Command a person would use to run the generated files
    pub fn run_hint(&self, files: &[String]) -> String {
        match self {
            TargetLanguage::Python => format!("pytest {} -v", files.join(" ")),
        }
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::Python => write!(f, "Python"),
        }
    }
}

/// Role of a step within a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum StepRole {
    #[serde(rename = "given", alias = "Given", alias = "precondition")]
    Precondition,
    #[serde(rename = "when", alias = "When", alias = "action")]
    Action,
    #[serde(rename = "then", alias = "Then", alias = "outcome")]
    Outcome,
    #[serde(rename = "and", alias = "And", alias = "conjunction")]
    Conjunction,
    #[serde(rename = "but", alias = "But", alias = "exception")]
    Exception,
}

/// A single step in a test scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioStep {
    #[serde(rename = "step_type")]
    pub role: StepRole,
    /// Original text of the step
    #[serde(rename = "description")]
    pub text: String,
    /// Inferred action to perform
    #[serde(rename = "action", default)]
    pub inferred_action: Option<String>,
    /// Target endpoint, element, or field
    #[serde(default)]
    pub target: Option<String>,
    /// Value to send or verify
    #[serde(default)]
    pub value: Option<String>,
}

/// A scenario as understood by the interpret stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedScenario {
    pub feature_name: String,
    pub scenario_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ParsedScenario {
    /// Test function identifier, e.g. `test_successful_login`
    pub fn to_test_name(&self) -> String {
        naming::test_identifier(&self.scenario_name)
    }

    /// Test class identifier, e.g. `TestUserLogin`
    pub fn to_class_name(&self) -> String {
        naming::class_identifier(&self.feature_name)
    }
}

/// One action or setup/teardown step in a blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlueprintAction {
    pub action_type: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// One assertion in a blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlueprintAssertion {
    pub assertion_type: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub expected_value: Option<String>,
}

/// An element referenced by the test, candidate for a helper/page object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageElement {
    pub name: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Design for one generated test, produced by the design stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Blueprint {
    pub class_name: String,
    pub method_name: String,
    pub docstring: String,
    #[serde(default)]
    pub actions: Vec<BlueprintAction>,
    #[serde(default)]
    pub assertions: Vec<BlueprintAssertion>,
    #[serde(default)]
    pub setup: Vec<BlueprintAction>,
    #[serde(default)]
    pub teardown: Vec<BlueprintAction>,
    #[serde(default)]
    pub page_elements: Vec<PageElement>,
}

/// A helper file generated alongside the test (e.g. `conftest.py`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionFile {
    pub file_name: String,
    pub source_text: String,
    pub is_syntactically_valid: bool,
}

/// The generated test file plus its validity status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub file_name: String,
    pub source_text: String,
    pub artifact_count: usize,
    pub is_syntactically_valid: bool,
    pub review_notes: Vec<String>,
    pub companion: Option<CompanionFile>,
}

impl GeneratedArtifact {
    /// True when the primary file and any companion both parse
    pub fn all_valid(&self) -> bool {
        self.is_syntactically_valid
            && self
                .companion
                .as_ref()
                .map_or(true, |c| c.is_syntactically_valid)
    }
}

/// Result of publishing generated files as a change proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub branch_name: String,
    pub proposal_title: String,
    pub proposal_body: String,
    pub target_branch: String,
    pub files: Vec<String>,
    pub url: Option<String>,
    pub number: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl PublishOutcome {
    /// An outcome that has not succeeded yet
    pub fn pending(target_branch: &str, files: &[String]) -> Self {
        Self {
            branch_name: String::new(),
            proposal_title: String::new(),
            proposal_body: String::new(),
            target_branch: target_branch.to_string(),
            files: files.to_vec(),
            url: None,
            number: None,
            success: false,
            error_message: None,
        }
    }

    /// Mark the outcome failed, keeping whatever was populated so far
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.url = None;
        self.number = None;
        self.error_message = Some(message.into());
        self
    }

    /// Mark the outcome successful. An empty URL is never a success.
    pub fn succeeded(mut self, url: &str) -> Self {
        let url = url.trim();
        if url.is_empty() {
            return self.failed("change proposal returned no URL");
        }
        self.number = naming::proposal_number(url);
        self.url = Some(url.to_string());
        self.success = true;
        self.error_message = None;
        self
    }
}

/// Root object returned to the caller for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub source_identifier: String,
    pub scenario_count: usize,
    pub artifacts: Vec<GeneratedArtifact>,
    pub publish: Option<PublishOutcome>,
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl WorkflowResult {
    pub fn new(source_identifier: impl Into<String>, scenario_count: usize) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            scenario_count,
            artifacts: Vec::new(),
            publish: None,
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an unrecoverable error for this run
    pub fn fail(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_roles_accept_gherkin_keywords() {
        let step: ScenarioStep = serde_json::from_str(
            r#"{"step_type": "Given", "description": "the user is logged out"}"#,
        )
        .unwrap();
        assert_eq!(step.role, StepRole::Precondition);
        assert!(step.inferred_action.is_none());

        let step: ScenarioStep =
            serde_json::from_str(r#"{"step_type": "then", "description": "x", "action": "verify"}"#)
                .unwrap();
        assert_eq!(step.role, StepRole::Outcome);
        assert_eq!(step.inferred_action.as_deref(), Some("verify"));
    }

    #[test]
    fn test_scenario_identifiers() {
        let scenario = ParsedScenario {
            feature_name: "user login-page".to_string(),
            scenario_name: "Successful Login!".to_string(),
            description: None,
            steps: Vec::new(),
            tags: BTreeSet::new(),
        };
        assert_eq!(scenario.to_test_name(), "test_successful_login");
        assert_eq!(scenario.to_class_name(), "TestUserLoginpage");
    }

    #[test]
    fn test_publish_outcome_requires_url() {
        let outcome = PublishOutcome::pending("main", &["a.py".to_string()]).succeeded("  ");
        assert!(!outcome.success);
        assert!(outcome.url.is_none());

        let outcome = PublishOutcome::pending("main", &[])
            .succeeded("https://github.com/acme/shop/pull/42");
        assert!(outcome.success);
        assert_eq!(outcome.number, Some(42));
    }

    #[test]
    fn test_failed_clears_url() {
        let outcome = PublishOutcome::pending("main", &[])
            .succeeded("https://github.com/acme/shop/pull/7")
            .failed("push rejected");
        assert!(!outcome.success);
        assert!(outcome.url.is_none());
        assert_eq!(outcome.error_message.as_deref(), Some("push rejected"));
    }
}
