//! # Design Skill
//!
//! Second stage: interpreted scenario in, test blueprint out.

use crate::extract::decode_json;
use crate::schema::Blueprint;
use crate::workflow::Stage;

use super::prompts::{self, output_schema};
use super::StageSkill;

#[derive(Debug, Clone, Copy, Default)]
pub struct DesignSkill;

impl DesignSkill {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(raw: &str) -> Option<Blueprint> {
        decode_json(raw)
    }
}

impl StageSkill for DesignSkill {
    fn stage(&self) -> Stage {
        Stage::Design
    }

    fn role_context(&self) -> &str {
        prompts::DESIGN
    }

    fn build_prompt(&self, interpreted: &str) -> String {
        format!(
            "Design one pytest test for the interpreted scenario below.\n\n## Interpreted scenario\n{}\n\n## Output schema\n```json\n{}\n```",
            interpreted.trim(),
            output_schema::<Blueprint>()
        )
    }
}
