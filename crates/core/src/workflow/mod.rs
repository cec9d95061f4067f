//! # Generation Workflow
//!
//! Drives a scenario through the generation stages and hands the result
//! to storage and the publisher.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Scenario → Interpret → Design → Synthesize → Validate → Extract → Save → (Publish)
//! ```

pub mod events;
pub mod orchestrator;
pub mod pipeline;

pub use events::{WorkflowEvent, WorkflowEventKind};
pub use orchestrator::{run_until_interrupted, TestGenerator, GENERATED_NOTE};
pub use pipeline::{Pipeline, PipelineStage, Stage};
