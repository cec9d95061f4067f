//! Commit message, proposal title and proposal body.

use std::fmt::Write;

use crate::schema::TargetLanguage;

/// Text of one change proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalText {
    pub title: String,
    pub body: String,
    pub commit_message: String,
}

impl ProposalText {
    pub fn new(
        title_prefix: &str,
        feature: &str,
        scenario_count: usize,
        files: &[String],
        language: TargetLanguage,
    ) -> Self {
        Self {
            title: format!("{}Add tests for {}", title_prefix, feature),
            body: proposal_body(feature, scenario_count, files, language),
            commit_message: format!("Add auto-generated tests for {}", feature),
        }
    }
}

/// Markdown summary listing the feature, scenario count and files
pub fn proposal_body(
    feature: &str,
    scenario_count: usize,
    files: &[String],
    language: TargetLanguage,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "## Auto-Generated Test Cases\n");
    let _ = writeln!(
        body,
        "This pull request was generated by testsmith from a natural-language test scenario.\n"
    );
    let _ = writeln!(body, "### Summary");
    let _ = writeln!(body, "- **Feature**: {}", feature);
    let _ = writeln!(body, "- **Scenarios**: {} test scenario(s)", scenario_count);
    let _ = writeln!(body, "- **Files Generated**: {}\n", files.len());
    let _ = writeln!(body, "### Generated Files");
    for file in files {
        let _ = writeln!(body, "- `{}`", file);
    }
    let _ = writeln!(body, "\n### How to Run");
    let _ = writeln!(body, "```bash\n{}\n```\n", language.run_hint(files));
    let _ = writeln!(body, "### Notes");
    let _ = writeln!(body, "- Review endpoints, selectors and test data before merging");
    let _ = writeln!(body, "- Consider adding these tests to your CI pipeline");
    body
}
