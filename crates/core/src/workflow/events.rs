//! # Workflow Events
//!
//! Progress events emitted during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pipeline::Stage;

/// Kind of workflow event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    PipelineStarted,
    StageStarted,
    StageCompleted,
    StageFailed,
    /// Source recovered from the final stage output
    ArtifactExtracted,
    ArtifactSaved,
    PublishStarted,
    PublishCompleted,
    PublishFailed,
    PipelineCompleted,
    PipelineFailed,
}

/// An event in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: WorkflowEventKind,
    /// Stage the event belongs to, if any
    #[serde(default)]
    pub stage: Option<Stage>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl WorkflowEvent {
    pub fn new(kind: WorkflowEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            stage: None,
            data: None,
        }
    }

    pub fn for_stage(kind: WorkflowEventKind, stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::new(kind)
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = WorkflowEvent::for_stage(WorkflowEventKind::StageStarted, Stage::Design)
            .with_data(serde_json::json!({"chars": 120}));

        assert_eq!(event.stage, Some(Stage::Design));
        assert_eq!(event.data.unwrap()["chars"], 120);
        assert_ne!(
            WorkflowEvent::new(WorkflowEventKind::PipelineStarted).id,
            WorkflowEvent::new(WorkflowEventKind::PipelineStarted).id
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&WorkflowEvent::new(WorkflowEventKind::PublishFailed)).unwrap();
        assert!(json.contains("\"publish_failed\""));
    }
}
