//! # Interpret Skill
//!
//! First stage: free-form scenario text in, structured scenario out.

use crate::extract::decode_json;
use crate::schema::ParsedScenario;
use crate::workflow::Stage;

use super::prompts::{self, output_schema};
use super::StageSkill;

#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretSkill;

impl InterpretSkill {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort decode of the stage output
    pub fn decode(raw: &str) -> Option<ParsedScenario> {
        decode_json(raw)
    }
}

impl StageSkill for InterpretSkill {
    fn stage(&self) -> Stage {
        Stage::Interpret
    }

    fn role_context(&self) -> &str {
        prompts::INTERPRET
    }

    fn build_prompt(&self, scenario_text: &str) -> String {
        format!(
            "Interpret the following test scenario.\n\n## Scenario\n{}\n\n## Output schema\n```json\n{}\n```",
            scenario_text.trim(),
            output_schema::<ParsedScenario>()
        )
    }
}
