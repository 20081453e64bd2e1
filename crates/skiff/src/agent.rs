use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::models::message::{validate_tool_pairing, Message};
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::providers::base::{ModelClient, StopReason, Usage};
use crate::skills::SkillLibrary;
use crate::state::SessionState;
use crate::subagent::{TaskProgress, TaskRunner};
use crate::tools::{ToolContext, ToolDispatcher, ToolRegistry};

/// Called before each tool runs with the tool name, the 1-based invocation
/// index within the run, and seconds elapsed since the run started.
pub type ToolProgress<'a> = dyn Fn(&str, usize, f64) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model answered without requesting tools
    Done,
    /// The turn budget ran out while the model still wanted tools
    MaxTurnsReached,
}

/// The outcome of one [`Agent::run`]
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub messages: Vec<Message>,
    pub turns: usize,
    pub tool_invocations: usize,
    pub status: RunStatus,
    pub usage: Usage,
}

impl AgentRun {
    /// Text of the last assistant message
    pub fn final_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.text())
    }
}

/// Agent drives a model through the tool-calling loop
pub struct Agent {
    client: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl Agent {
    pub fn new(client: Arc<dyn ModelClient>, dispatcher: ToolDispatcher, config: AgentConfig) -> Self {
        Self {
            client,
            dispatcher,
            config,
        }
    }

    /// A main agent over the built-in tools, able to delegate to subagents.
    pub fn with_standard_tools(
        client: Arc<dyn ModelClient>,
        root: impl Into<PathBuf>,
        config: AgentConfig,
        skills: Arc<SkillLibrary>,
        progress: Arc<dyn TaskProgress>,
    ) -> Result<Self> {
        let registry = Arc::new(ToolRegistry::standard(skills)?);
        let state = Arc::new(SessionState::new(&config));
        let base = ToolDispatcher::new(registry, ToolContext::new(root, config.clone(), state));
        let runner = Arc::new(TaskRunner::new(Arc::clone(&client), base.clone(), progress));
        Ok(Self::new(client, base.with_task_runner(runner), config))
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> &Arc<SessionState> {
        self.dispatcher.state()
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher.tools()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Send `text` as the next user turn after `history` and run it. Reminder
    /// state only advances once the run completes, so an interrupted or failed
    /// run can be retried from the same history.
    pub async fn reply(
        &self,
        system: &str,
        history: &[Message],
        text: &str,
        progress: Option<&ToolProgress<'_>>,
    ) -> Result<AgentRun> {
        let mut messages = history.to_vec();
        messages.push(self.state().prepare_user_message(text));
        let run = self.run(system, messages, progress).await?;
        self.state().commit_user_turn();
        Ok(run)
    }

    /// Run the loop from `messages` until the model stops asking for tools
    /// or the turn budget is spent. Model and transport errors propagate.
    pub async fn run(
        &self,
        system: &str,
        messages: Vec<Message>,
        progress: Option<&ToolProgress<'_>>,
    ) -> Result<AgentRun> {
        let started = Instant::now();
        let tools = self.tools();
        let mut history = messages;
        let mut turns = 0;
        let mut tool_invocations = 0;
        let mut usage = Usage::default();

        info!(
            agent = %self.dispatcher.context().capability.label(),
            messages = history.len(),
            max_turns = self.config.max_turns,
            "agent run started"
        );

        loop {
            if turns >= self.config.max_turns {
                warn!(turns, tool_invocations, "turn budget exhausted, stopping");
                return Ok(AgentRun {
                    messages: history,
                    turns,
                    tool_invocations,
                    status: RunStatus::MaxTurnsReached,
                    usage,
                });
            }
            turns += 1;

            let turn = self
                .client
                .complete(system, &history, &tools, self.config.max_tokens)
                .await?;
            usage.accumulate(&turn.extracted.usage);

            let calls = turn.extracted.tool_calls;
            if calls.is_empty() || turn.extracted.stop_reason != StopReason::ToolUse {
                // Calls we will not run must not stay in history unanswered
                history.push(turn.message.without_tool_uses());
                info!(turns, tool_invocations, "agent run finished");
                return Ok(AgentRun {
                    messages: history,
                    turns,
                    tool_invocations,
                    status: RunStatus::Done,
                    usage,
                });
            }

            debug!(turn = turns, calls = calls.len(), "executing tool calls");
            let offset = tool_invocations;
            let dispatcher = &self.dispatcher;
            let pending: Vec<_> = calls
                .iter()
                .enumerate()
                .map(|(index, call)| async move {
                    if let Some(progress) = progress {
                        progress(&call.name, offset + index + 1, started.elapsed().as_secs_f64());
                    }
                    dispatcher.dispatch(call).await.into_result(&call.id)
                })
                .collect();
            let results = stream::iter(pending)
                .buffered(self.config.max_parallel_tools.max(1))
                .collect::<Vec<_>>()
                .await;
            tool_invocations += calls.len();

            let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
            self.dispatcher.state().record_tool_calls(&names);

            let results_message = self.client.format_tool_results(&results);
            if let Err(e) = validate_tool_pairing(&turn.message, &results_message) {
                warn!(error = %e, "tool results do not pair with their calls");
            }
            history.push(turn.message);
            history.push(results_message);
        }
    }
}
