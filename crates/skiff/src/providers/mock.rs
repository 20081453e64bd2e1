use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Extracted, Provider, StopReason, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    fail: bool,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A provider whose every call fails like a transport error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Histories seen by each call, in call order
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Response = Message;

    async fn create_message(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
        _max_tokens: u32,
    ) -> Result<Message> {
        if self.fail {
            return Err(anyhow!("Server error: 503 Service Unavailable"));
        }
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok(Message::assistant().with_text(""))
        } else {
            Ok(responses.remove(0))
        }
    }

    fn extract_text_and_tool_calls(&self, response: &Message) -> Extracted {
        let tool_calls = response.tool_calls();
        Extracted {
            text_blocks: response
                .content
                .iter()
                .filter_map(|c| c.as_text().map(str::to_string))
                .collect(),
            stop_reason: if tool_calls.is_empty() {
                StopReason::EndTurn
            } else {
                StopReason::ToolUse
            },
            tool_calls,
            usage: Usage::new(Some(1), Some(1), Some(2)),
        }
    }

    fn format_assistant_message(&self, response: &Message) -> Message {
        response.clone()
    }
}
