//! Delegation of self-contained tasks to child agents with narrower tool sets.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::errors::ERROR_MARKER;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::prompt_template::subagent_prompt;
use crate::providers::base::ModelClient;
use crate::state::SessionState;
use crate::tools::{Capability, ToolDispatcher, ToolName};

pub const NO_OUTPUT: &str = "(subagent produced no output)";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentType {
    Explore,
    Code,
    Plan,
}

impl AgentType {
    pub fn allows(&self, tool: ToolName) -> bool {
        match self {
            AgentType::Explore => matches!(
                tool,
                ToolName::ReadFile
                    | ToolName::ListDirectory
                    | ToolName::Glob
                    | ToolName::Grep
                    | ToolName::Bash
            ),
            AgentType::Plan => matches!(
                tool,
                ToolName::ReadFile | ToolName::ListDirectory | ToolName::Glob | ToolName::Grep
            ),
            AgentType::Code => true,
        }
    }

    pub fn read_only_shell(&self) -> bool {
        matches!(self, AgentType::Explore)
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            AgentType::Explore => {
                "Find and read what is needed to answer the task. You may run read-only shell \
                 commands such as ls, grep or git log, but you cannot modify anything. Report \
                 concrete file paths and line numbers."
            }
            AgentType::Plan => {
                "Study the relevant code and produce a step-by-step implementation plan. You can \
                 read and search files but cannot run commands or edit anything. Name the files \
                 each step touches."
            }
            AgentType::Code => {
                "Make the requested change. You can read, write and edit files and run commands. \
                 Verify your work where possible and summarise exactly what you changed."
            }
        }
    }
}

/// Observer for subagent lifecycles, keyed by agent type and task description.
pub trait TaskProgress: Send + Sync {
    fn start(&self, agent_type: AgentType, description: &str);

    fn update(
        &self,
        agent_type: AgentType,
        description: &str,
        tool_name: &str,
        tool_count: usize,
        elapsed_secs: f64,
    );

    /// Called once the child stops, with the outcome and total run time.
    fn finish(&self, agent_type: AgentType, description: &str, success: bool, elapsed_secs: f64);
}

/// Reports subagent progress through `tracing`
#[derive(Debug, Default)]
pub struct TracingProgress;

impl TaskProgress for TracingProgress {
    fn start(&self, agent_type: AgentType, description: &str) {
        info!(%agent_type, description, "subagent started");
    }

    fn update(
        &self,
        agent_type: AgentType,
        description: &str,
        tool_name: &str,
        tool_count: usize,
        elapsed_secs: f64,
    ) {
        info!(%agent_type, description, tool = tool_name, tool_count, elapsed_secs, "subagent tool call");
    }

    fn finish(&self, agent_type: AgentType, description: &str, success: bool, elapsed_secs: f64) {
        info!(%agent_type, description, success, elapsed_secs, "subagent finished");
    }
}

/// Runs `task` tool calls as isolated child conversations.
pub struct TaskRunner {
    client: Arc<dyn ModelClient>,
    base: ToolDispatcher,
    progress: Arc<dyn TaskProgress>,
}

impl TaskRunner {
    /// `base` is the parent's dispatcher; children narrow it and share its registry.
    pub fn new(
        client: Arc<dyn ModelClient>,
        base: ToolDispatcher,
        progress: Arc<dyn TaskProgress>,
    ) -> Self {
        Self {
            client,
            base,
            progress,
        }
    }

    /// Run a subagent to completion and return its final answer. Failures come
    /// back as an error string rather than propagating to the parent.
    pub async fn run_task(&self, description: &str, prompt: &str, agent_type: AgentType) -> String {
        match self.try_run_task(description, prompt, agent_type).await {
            Ok(answer) => answer,
            Err(e) => format!("{}{} subagent failed: {:#}", ERROR_MARKER, agent_type, e),
        }
    }

    pub async fn try_run_task(
        &self,
        description: &str,
        prompt: &str,
        agent_type: AgentType,
    ) -> Result<String> {
        let parent = self.base.context();
        let config = parent.config.for_subagent();
        let state = Arc::new(SessionState::new(&config));
        let dispatcher = self
            .base
            .narrowed(Capability::Subagent(agent_type), state);
        let system = subagent_prompt(agent_type, description, parent.root(), &dispatcher.tools())
            .context("Failed to render subagent prompt")?;

        let agent = Agent::new(Arc::clone(&self.client), dispatcher, config);
        let progress = Arc::clone(&self.progress);
        let on_tool = move |tool: &str, count: usize, elapsed: f64| {
            progress.update(agent_type, description, tool, count, elapsed)
        };

        let started = Instant::now();
        self.progress.start(agent_type, description);
        let result = agent
            .run(&system, vec![Message::user().with_text(prompt)], Some(&on_tool))
            .await;
        self.progress.finish(
            agent_type,
            description,
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        let run = result.map_err(|e| {
            warn!(%agent_type, description, error = %e, "subagent failed");
            e
        })?;

        let answer = run
            .messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.text())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_OUTPUT.to_string());
        Ok(answer)
    }
}
