//! # Stage Runner
//!
//! One call to the text generator per stage. No retries: an error or an
//! empty response is returned to the orchestrator, which halts the run.

use crate::error::StageError;
use crate::models::TextGenerator;

use super::StageSkill;

/// Stateless runner borrowing the shared generator
#[derive(Clone, Copy)]
pub struct StageRunner<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> StageRunner<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Fill the skill's prompt with `upstream` and return the raw response
    pub async fn run(&self, skill: &dyn StageSkill, upstream: &str) -> Result<String, StageError> {
        let stage = skill.stage();
        let prompt = skill.build_prompt(upstream);
        tracing::debug!(%stage, prompt_chars = prompt.len(), "Running stage");

        let output = self
            .generator
            .generate(&prompt, skill.role_context())
            .await
            .map_err(|source| StageError::Generation { stage, source })?;

        if output.trim().is_empty() {
            return Err(StageError::EmptyResponse { stage });
        }
        tracing::debug!(%stage, output_chars = output.len(), "Stage produced output");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::skills::{DesignSkill, InterpretSkill};
    use crate::testing::ScriptedGenerator;
    use crate::workflow::Stage;

    #[tokio::test]
    async fn test_run_returns_raw_text_and_sends_role() {
        let generator = ScriptedGenerator::new(vec![Ok("{\"feature_name\": \"x\"}".to_string())]);
        let runner = StageRunner::new(&generator);

        let out = runner.run(&InterpretSkill::new(), "Feature: Login").await.unwrap();
        assert_eq!(out, "{\"feature_name\": \"x\"}");

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Feature: Login"));
        assert!(calls[0].role_context.contains("Interpreter"));
    }

    #[tokio::test]
    async fn test_empty_response_fails_stage() {
        let generator = ScriptedGenerator::new(vec![Ok("  \n".to_string())]);
        let err = StageRunner::new(&generator)
            .run(&DesignSkill::new(), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::EmptyResponse { stage: Stage::Design }));
    }

    #[tokio::test]
    async fn test_generator_error_fails_stage() {
        let generator =
            ScriptedGenerator::new(vec![Err(LlmError::Http("connection refused".to_string()))]);
        let err = StageRunner::new(&generator)
            .run(&InterpretSkill::new(), "x")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Interpret);
        assert!(err.to_string().contains("connection refused"));
    }
}
