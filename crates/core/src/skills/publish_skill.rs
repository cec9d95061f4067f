//! # Publish Skill
//!
//! Agent-mediated publishing: a bounded loop in which the model answers in
//! free text and any JSON object with a `"tool"` key is executed as a tool
//! call. The tools themselves are supplied by the publisher, so the agent
//! can only sequence the same steps the deterministic path runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::balanced_objects;
use crate::models::TextGenerator;

use super::prompts;

/// Tool names the agent may call
pub const TOOL_NAMES: [&str; 5] = [
    "check_git_status",
    "create_branch",
    "commit_files",
    "push_branch",
    "create_pull_request",
];

/// A tool call parsed from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// What a tool reported back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub ok: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: output.into(),
        }
    }
}

/// Tool executor handed to the agent
#[async_trait]
pub trait AgentTools: Send {
    async fn call(&mut self, call: &ToolCall) -> ToolOutput;

    /// True once the goal has been reached and the loop can stop
    fn done(&self) -> bool;
}

/// How an agent run ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReport {
    pub turns: usize,
    pub tool_calls: usize,
    /// Last free-text answer, if the model gave one
    pub final_answer: Option<String>,
    /// Generator failure that cut the run short
    pub error: Option<String>,
}

/// Find the first tool call in a model reply
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    balanced_objects(reply)
        .filter(|candidate| candidate.contains("\"tool\""))
        .find_map(|candidate| serde_json::from_str::<ToolCall>(candidate).ok())
}

/// Drives the publish agent loop
pub struct PublishAgent<'a> {
    generator: &'a dyn TextGenerator,
    max_turns: usize,
}

impl<'a> PublishAgent<'a> {
    pub fn new(generator: &'a dyn TextGenerator, max_turns: usize) -> Self {
        Self {
            generator,
            max_turns,
        }
    }

    /// Run until the model answers without a tool call, the tools report
    /// done, a generator call fails, or the turn budget is spent.
    pub async fn run(&self, task: &str, tools: &mut dyn AgentTools) -> AgentReport {
        let mut report = AgentReport::default();
        let mut transcript = task.trim().to_string();

        while report.turns < self.max_turns {
            report.turns += 1;
            let reply = match self.generator.generate(&transcript, prompts::PUBLISH).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, turn = report.turns, "Publish agent generation failed");
                    report.error = Some(e.to_string());
                    return report;
                }
            };

            let Some(call) = parse_tool_call(&reply) else {
                report.final_answer = Some(reply.trim().to_string());
                return report;
            };

            report.tool_calls += 1;
            let result = tools.call(&call).await;
            tracing::info!(tool = %call.tool, ok = result.ok, turn = report.turns, "Publish agent tool call");

            transcript.push_str(&format!(
                "\n\n## Your previous reply\n{}\n\n## Tool result: {} ({})\n{}",
                reply.trim(),
                call.tool,
                if result.ok { "ok" } else { "error" },
                result.output.trim()
            ));

            if tools.done() {
                return report;
            }
        }

        tracing::warn!(max_turns = self.max_turns, "Publish agent ran out of turns");
        report
    }
}
