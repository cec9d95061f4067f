//! # Pipeline Stages
//!
//! Fixed linear state machine: interpret, design, synthesize, validate.
//! No stage is ever revisited.

use serde::{Deserialize, Serialize};

/// One generation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Scenario text to structured scenario
    Interpret,
    /// Structured scenario to test blueprint
    Design,
    /// Blueprint to test source
    Synthesize,
    /// Review of the synthesized source
    Validate,
}

impl Stage {
    /// Stages in execution order
    pub const ALL: [Stage; 4] = [
        Stage::Interpret,
        Stage::Design,
        Stage::Synthesize,
        Stage::Validate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Interpret => "interpret",
            Stage::Design => "design",
            Stage::Synthesize => "synthesize",
            Stage::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Running(Stage),
    /// All four stages produced output
    Complete,
    /// A stage failed; the remaining stages were not run
    Failed(Stage),
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Running(Stage::Interpret),
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage that should run next, if any
    pub fn current(&self) -> Option<Stage> {
        match self.stage {
            PipelineStage::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Running(Stage::Interpret) => PipelineStage::Running(Stage::Design),
            PipelineStage::Running(Stage::Design) => PipelineStage::Running(Stage::Synthesize),
            PipelineStage::Running(Stage::Synthesize) => PipelineStage::Running(Stage::Validate),
            PipelineStage::Running(Stage::Validate) => PipelineStage::Complete,
            terminal => terminal,
        };
    }

    /// Fail the pipeline at the current stage
    pub fn fail(&mut self) {
        if let PipelineStage::Running(stage) = self.stage {
            self.stage = PipelineStage::Failed(stage);
        }
    }
}
