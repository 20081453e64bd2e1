use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_input, ToolContext, ToolExecutor};
use crate::errors::ToolError;
use crate::models::tool::Tool;
use crate::subagent::AgentType;

#[derive(Deserialize)]
struct TaskInput {
    description: String,
    prompt: String,
    subagent_type: String,
}

pub struct TaskTool;

#[async_trait]
impl ToolExecutor for TaskTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "task",
            "Delegate a self-contained task to a subagent with its own fresh context. \
             'explore' searches and reads (read-only shell), 'plan' reads and designs without a shell, \
             'code' can edit files and run commands. The subagent's final answer is returned.",
            json!({
                "type": "object",
                "required": ["description", "prompt", "subagent_type"],
                "properties": {
                    "description": {"type": "string", "description": "A short (3-5 word) label for the task."},
                    "prompt": {"type": "string", "description": "Complete instructions; the subagent sees nothing else."},
                    "subagent_type": {"type": "string", "enum": ["explore", "plan", "code"]}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: TaskInput = parse_input(input)?;
        let agent_type = AgentType::from_str(&input.subagent_type).map_err(|_| {
            ToolError::InvalidParameters(format!(
                "Unknown subagent_type '{}', expected explore, plan or code",
                input.subagent_type
            ))
        })?;

        let runner = ctx.task_runner.as_ref().ok_or_else(|| ToolError::NotPermitted {
            tool: "task".to_string(),
            agent: ctx.capability.label(),
        })?;

        runner
            .try_run_task(&input.description, &input.prompt, agent_type)
            .await
            .map_err(|e| ToolError::SubagentFailed {
                agent: agent_type.to_string(),
                reason: format!("{:#}", e),
            })
    }
}
