use std::sync::Arc;

use anyhow::Result;
use skiff::agent::{Agent, AgentRun, RunStatus};
use skiff::models::message::Message;

use crate::progress::ConsoleProgress;
use crate::prompt::{print_markdown, CliclackPrompt, InputType};

pub struct Session {
    agent: Agent,
    system: String,
    prompt: CliclackPrompt,
    progress: Arc<ConsoleProgress>,
    messages: Vec<Message>,
}

impl Session {
    pub fn new(
        agent: Agent,
        system: String,
        prompt: CliclackPrompt,
        progress: Arc<ConsoleProgress>,
    ) -> Self {
        Session {
            agent,
            system,
            prompt,
            progress,
            messages: Vec::new(),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        let root = self.agent.dispatcher().context().root().display().to_string();
        self.prompt.intro(&root)?;

        loop {
            match self.prompt.get_input()? {
                InputType::Message(text) => self.process(&text).await?,
                InputType::Clear => {
                    self.messages.clear();
                    self.agent.state().reset();
                    self.prompt.info("Conversation cleared");
                }
                InputType::Todos => self.prompt.info(&self.agent.state().render_todos()),
                InputType::Help => self.prompt.help(),
                InputType::Exit => break,
            }
        }

        self.prompt.outro()
    }

    /// Run a single request without interaction and print the final answer
    pub async fn headless_start(&mut self, text: &str) -> Result<()> {
        let run = self.reply(text).await?;
        if let Some(run) = run {
            if let Some(answer) = run.final_text() {
                print_markdown(&answer)?;
                println!();
            }
            if run.status == RunStatus::MaxTurnsReached {
                self.prompt.warning("Stopped: turn limit reached");
            }
        }
        Ok(())
    }

    async fn process(&mut self, text: &str) -> Result<()> {
        let previous = self.messages.len();
        match self.reply(text).await {
            Ok(Some(run)) => {
                // Skip the user message we just sent
                self.prompt.render(&self.messages[previous + 1..])?;
                if run.status == RunStatus::MaxTurnsReached {
                    self.prompt.warning(&format!(
                        "Stopped after {} turns. Send another message to continue.",
                        run.turns
                    ));
                }
            }
            Ok(None) => self
                .prompt
                .warning("Interrupt: Resetting conversation to before the last sent message..."),
            Err(e) => self.prompt.error(&format!("{:#}", e)),
        }
        Ok(())
    }

    /// Send `text` and wait for the agent to finish. The history only
    /// advances when the run completes; an interrupt or failure leaves it as
    /// it was before the message. Returns `None` when interrupted.
    async fn reply(&mut self, text: &str) -> Result<Option<AgentRun>> {
        let progress = Arc::clone(&self.progress);
        let on_tool = move |tool: &str, _index: usize, _elapsed: f64| progress.tool_started(tool);

        let outcome = tokio::select! {
            result = self.agent.reply(&self.system, &self.messages, text, Some(&on_tool)) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(result) => {
                let run = result?;
                self.messages = run.messages.clone();
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }
}
