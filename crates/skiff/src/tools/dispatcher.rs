use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use super::{Capability, ToolContext, ToolName, ToolRegistry};
use crate::errors::ToolError;
use crate::models::message::ToolResult;
use crate::models::tool::{Tool, ToolCall};
use crate::security::truncate;
use crate::state::SessionState;
use crate::subagent::TaskRunner;

/// What a tool call produced, always representable as a tool result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn into_result(self, tool_use_id: &str) -> ToolResult {
        ToolResult::new(tool_use_id, self.content, self.is_error)
    }
}

impl From<ToolError> for ToolOutput {
    fn from(error: ToolError) -> Self {
        ToolOutput {
            content: error.render(),
            is_error: true,
        }
    }
}

/// Routes tool calls to executors within the caller's capability.
///
/// A dispatch never fails: refusals, invalid input, executor errors and
/// panics all come back as an error result for the model to read.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.context.state
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn with_task_runner(mut self, runner: Arc<TaskRunner>) -> Self {
        self.context.task_runner = Some(runner);
        self
    }

    /// A child dispatcher over the same registry, restricted to `capability`
    /// and bound to its own session state. Subagents never get a task runner.
    pub fn narrowed(&self, capability: Capability, state: Arc<SessionState>) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            context: ToolContext {
                root: self.context.root.clone(),
                capability,
                state,
                config: self.context.config.clone(),
                task_runner: None,
            },
        }
    }

    /// Definitions this dispatcher will accept
    pub fn tools(&self) -> Vec<Tool> {
        self.registry
            .definitions()
            .into_iter()
            .filter(|(name, _)| self.context.capability.allows(*name))
            .map(|(_, tool)| tool)
            .collect()
    }

    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        match self.try_dispatch(call).await {
            Ok(content) => ToolOutput {
                content: truncate(&content, self.context.config.max_output_bytes),
                is_error: false,
            },
            Err(error) => {
                if matches!(error, ToolError::Security(_) | ToolError::NotPermitted { .. }) {
                    warn!(tool = %call.name, agent = %self.context.capability.label(), %error, "tool call refused");
                } else {
                    debug!(tool = %call.name, %error, "tool call failed");
                }
                let mut output = ToolOutput::from(error);
                output.content = truncate(&output.content, self.context.config.max_output_bytes);
                output
            }
        }
    }

    async fn try_dispatch(&self, call: &ToolCall) -> Result<String, ToolError> {
        let name = ToolName::from_str(&call.name)
            .map_err(|_| ToolError::ToolNotFound(call.name.clone()))?;

        if !self.context.capability.allows(name) {
            return Err(ToolError::NotPermitted {
                tool: call.name.clone(),
                agent: self.context.capability.label(),
            });
        }

        let executor = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound(call.name.clone()))?;

        debug!(tool = %name, id = %call.id, "dispatching tool call");
        AssertUnwindSafe(executor.execute(call.input.clone(), &self.context))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ToolError::Internal(format!("tool '{}' panicked: {}", name, reason)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::models::tool::Tool;
    use crate::subagent::AgentType;
    use crate::tools::registry::entry;
    use crate::tools::ToolExecutor;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct PanickingGlob;

    #[async_trait]
    impl ToolExecutor for PanickingGlob {
        fn definition(&self) -> Tool {
            Tool::new("glob", "panics", json!({"type": "object"}))
        }

        async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
            panic!("boom")
        }
    }

    struct LoudGrep;

    #[async_trait]
    impl ToolExecutor for LoudGrep {
        fn definition(&self) -> Tool {
            Tool::new("grep", "prints a lot", json!({"type": "object"}))
        }

        async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
            Ok("x".repeat(10_000))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let registry = ToolRegistry::build(vec![
            entry(ToolName::Glob, PanickingGlob),
            entry(ToolName::Grep, LoudGrep),
        ])
        .unwrap();
        let config = AgentConfig {
            max_output_bytes: 500,
            ..AgentConfig::default()
        };
        let state = Arc::new(SessionState::new(&config));
        ToolDispatcher::new(Arc::new(registry), ToolContext::new("/sandbox", config, state))
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let output = dispatcher()
            .dispatch(&ToolCall::new("1", "fly", json!({})))
            .await;
        assert!(output.is_error);
        assert_eq!(output.content, "Error: Unknown tool: fly");

        // Known name, no executor registered
        let output = dispatcher()
            .dispatch(&ToolCall::new("2", "bash", json!({})))
            .await;
        assert_eq!(output.content, "Error: Unknown tool: bash");
    }

    #[tokio::test]
    async fn test_panic_becomes_error_result() {
        let output = dispatcher()
            .dispatch(&ToolCall::new("1", "glob", json!({})))
            .await;
        assert!(output.is_error);
        assert!(output.content.starts_with("Error: "));
        assert!(output.content.contains("boom"));
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let output = dispatcher()
            .dispatch(&ToolCall::new("1", "grep", json!({})))
            .await;
        assert!(!output.is_error);
        assert!(output.content.len() <= 500);
        assert!(output.content.contains("output truncated"));
    }

    #[tokio::test]
    async fn test_narrowed_dispatcher_refuses_and_shares_registry() {
        let parent = dispatcher();
        let child_state = Arc::new(SessionState::new(&AgentConfig::default()));
        let child = parent.narrowed(Capability::Subagent(AgentType::Plan), child_state);

        assert!(Arc::ptr_eq(parent.registry(), child.registry()));
        assert!(child.context().task_runner.is_none());
        assert!(!Arc::ptr_eq(parent.state(), child.state()));

        let output = child
            .dispatch(&ToolCall::new("1", "bash", json!({"command": "ls"})))
            .await;
        assert_eq!(
            output.content,
            "Error: Tool 'bash' is not available to the plan agent"
        );

        let names: Vec<String> = child.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["glob", "grep"]);
    }
}
