//! Default prompt templates bundled at compile time.
//!
//! Each file is the role context (system message) of one skill. The task
//! text is assembled by the skill from upstream output.

use schemars::JsonSchema;

/// Interpret - scenario text to structured scenario
pub const INTERPRET: &str = include_str!("defaults/interpret.md");

/// Design - structured scenario to test blueprint
pub const DESIGN: &str = include_str!("defaults/design.md");

/// Synthesize - blueprint to pytest module
pub const SYNTHESIZE: &str = include_str!("defaults/synthesize.md");

/// Review - corrected module plus review notes
pub const REVIEW: &str = include_str!("defaults/review.md");

/// Publish - tool-calling agent that opens the pull request
pub const PUBLISH: &str = include_str!("defaults/publish.md");

/// Pretty JSON schema of `T`, for embedding in a task prompt
pub fn output_schema<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Blueprint;

    use crate::skills::{DesignSkill, InterpretSkill, ReviewSkill, StageSkill, SynthesizeSkill};

    #[test]
    fn test_stage_skills_use_bundled_prompts() {
        let synthesize = SynthesizeSkill::default();
        let skills: [(&dyn StageSkill, &str); 4] = [
            (&InterpretSkill, INTERPRET),
            (&DesignSkill, DESIGN),
            (&synthesize, SYNTHESIZE),
            (&ReviewSkill, REVIEW),
        ];
        for (skill, prompt) in skills {
            assert!(prompt.len() > 50, "prompt for {} seems too short", skill.stage());
            assert_eq!(skill.role_context(), prompt);
        }
    }

    #[test]
    fn test_output_schema_lists_fields() {
        let schema = output_schema::<Blueprint>();
        assert!(schema.contains("class_name"));
        assert!(schema.contains("assertions"));
    }

    #[test]
    fn test_publish_prompt_names_every_tool() {
        for tool in [
            "check_git_status",
            "create_branch",
            "commit_files",
            "push_branch",
            "create_pull_request",
        ] {
            assert!(PUBLISH.contains(tool), "publish prompt misses {}", tool);
        }
    }
}
