//! # Testsmith Skills
//!
//! One skill per generation stage plus the publishing agent.
//!
//! ```text
//! StageRunner
//!   └── StageSkill (role context + task prompt)
//!         interpret -> design -> synthesize -> review
//! PublishAgent
//!   └── AgentTools (supplied by the publisher)
//! ```

use crate::workflow::Stage;

pub mod prompts;
pub mod runner;

pub mod design_skill;
pub mod interpret_skill;
pub mod publish_skill;
pub mod review_skill;
pub mod synthesize_skill;

pub use design_skill::DesignSkill;
pub use interpret_skill::InterpretSkill;
pub use publish_skill::{AgentReport, AgentTools, PublishAgent, ToolCall, ToolOutput};
pub use review_skill::{ReviewReport, ReviewSkill};
pub use runner::StageRunner;
pub use synthesize_skill::SynthesizeSkill;

/// A generation stage as seen by the runner
pub trait StageSkill: Send + Sync {
    fn stage(&self) -> Stage;

    /// System message describing the role the model plays
    fn role_context(&self) -> &str;

    /// Task prompt filled with the upstream stage's full output
    /// (or the scenario text for the first stage)
    fn build_prompt(&self, upstream: &str) -> String;
}
