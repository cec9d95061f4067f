//! # Review Skill
//!
//! Final stage: generated module in, reviewed module plus notes out.
//! The artifact itself is recovered by the extractor; `ReviewReport` is
//! decoded separately for notes and the optional companion file.

use schemars::JsonSchema;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::extract::decode_json;
use crate::workflow::Stage;

use super::prompts::{self, output_schema};
use super::StageSkill;

/// Companion file name used when the review does not name one
pub const DEFAULT_COMPANION_FILE: &str = "conftest.py";

/// Structured review returned by the final stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReviewReport {
    /// Whether the received code passed review unchanged
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub review_notes: Vec<String>,
    #[serde(default)]
    pub improvements_made: Vec<String>,
    /// Complete corrected module
    #[serde(default)]
    pub final_code: String,
    /// Optional shared-fixture module
    #[serde(default)]
    pub companion_code: Option<String>,
    #[serde(default)]
    pub companion_filename: Option<String>,
}

impl ReviewReport {
    /// Review notes followed by the improvements, prefixed
    pub fn notes(&self) -> Vec<String> {
        self.review_notes
            .iter()
            .cloned()
            .chain(
                self.improvements_made
                    .iter()
                    .map(|change| format!("Improved: {}", change)),
            )
            .filter(|note| !note.trim().is_empty())
            .collect()
    }

    /// Companion file name and source, if the review supplied non-empty code
    pub fn companion(&self) -> Option<(String, String)> {
        let code = self.companion_code.as_deref()?.trim();
        if code.is_empty() {
            return None;
        }
        let name = self
            .companion_filename
            .as_deref()
            .map(str::trim)
            .filter(|n| is_plain_file_name(n))
            .unwrap_or(DEFAULT_COMPANION_FILE);
        Some((name.to_string(), format!("{}\n", code)))
    }
}

/// A bare `stem.ext` name that stays inside the output directory
fn is_plain_file_name(name: &str) -> bool {
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    let path = Path::new(name);
    path.file_stem().is_some() && path.extension().is_some_and(|ext| !ext.is_empty())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewSkill;

impl ReviewSkill {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(raw: &str) -> Option<ReviewReport> {
        decode_json(raw)
    }
}

impl StageSkill for ReviewSkill {
    fn stage(&self) -> Stage {
        Stage::Validate
    }

    fn role_context(&self) -> &str {
        prompts::REVIEW
    }

    fn build_prompt(&self, generated: &str) -> String {
        format!(
            "Review and correct the generated test module below.\n\n## Generated module\n{}\n\n## Output schema\n```json\n{}\n```",
            generated.trim(),
            output_schema::<ReviewReport>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_review_with_companion() {
        let raw = "```json\n{\"is_valid\": false, \"review_notes\": [\"missing import\"], \
                   \"improvements_made\": [\"added import requests\"], \
                   \"final_code\": \"import pytest\\nimport requests\\n\", \
                   \"companion_code\": \"import pytest\\n\\n@pytest.fixture\\ndef base_url():\\n    return 'http://x'\"}\n```";
        let report = ReviewSkill::decode(raw).unwrap();
        assert!(!report.is_valid);
        assert_eq!(
            report.notes(),
            vec!["missing import", "Improved: added import requests"]
        );
        let (name, code) = report.companion().unwrap();
        assert_eq!(name, "conftest.py");
        assert!(code.ends_with("'http://x'\n"));
    }

    #[test]
    fn test_companion_rejects_paths_and_blank_code() {
        let report = ReviewReport {
            companion_code: Some("x = 1".to_string()),
            companion_filename: Some("../evil.py".to_string()),
            ..Default::default()
        };
        assert_eq!(report.companion().unwrap().0, "conftest.py");

        let blank = ReviewReport {
            companion_code: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.companion().is_none());
    }

    #[test]
    fn test_companion_name_must_be_a_file_name() {
        for name in ["..", ".", ".py", "fixtures", "conftest.", "dir\\conftest.py"] {
            let report = ReviewReport {
                companion_code: Some("x = 1".to_string()),
                companion_filename: Some(name.to_string()),
                ..ReviewReport::default()
            };
            assert_eq!(report.companion().unwrap().0, DEFAULT_COMPANION_FILE, "{:?}", name);
        }

        let named = ReviewReport {
            companion_code: Some("x = 1".to_string()),
            companion_filename: Some(" fixtures.py ".to_string()),
            ..ReviewReport::default()
        };
        assert_eq!(named.companion().unwrap().0, "fixtures.py");
    }

    #[test]
    fn test_stage_is_validate() {
        assert_eq!(ReviewSkill::new().stage(), Stage::Validate);
    }
}
