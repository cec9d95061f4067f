//! # Synthesize Skill
//!
//! Third stage: blueprint in, test source out.

use crate::schema::TargetLanguage;
use crate::workflow::Stage;

use super::prompts;
use super::StageSkill;

#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesizeSkill {
    language: TargetLanguage,
}

impl SynthesizeSkill {
    pub fn new(language: TargetLanguage) -> Self {
        Self { language }
    }
}

impl StageSkill for SynthesizeSkill {
    fn stage(&self) -> Stage {
        Stage::Synthesize
    }

    fn role_context(&self) -> &str {
        prompts::SYNTHESIZE
    }

    fn build_prompt(&self, blueprint: &str) -> String {
        format!(
            "Write the complete {} test module for this blueprint.\n\n## Blueprint\n{}\n\nReply with the code in a single ```{} fenced block.",
            self.language,
            blueprint.trim(),
            self.language.fence_tags()[0]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_language_and_fence() {
        let prompt = SynthesizeSkill::new(TargetLanguage::Python).build_prompt("{}");
        assert!(prompt.contains("Python test module"));
        assert!(prompt.contains("```python"));
    }
}
