use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{Extracted, Provider, StopReason, Usage};
use super::configs::AnthropicProviderConfig;
use super::utils::{check_error_object, handle_response};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
        let mut anthropic_messages = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };

            let mut content = Vec::new();
            for msg_content in &message.content {
                match msg_content {
                    MessageContent::Text(text) => {
                        // The API rejects empty text blocks
                        if !text.text.is_empty() {
                            content.push(json!({"type": "text", "text": text.text}));
                        }
                    }
                    MessageContent::ToolUse(tool_use) => {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tool_use.id,
                            "name": tool_use.name,
                            "input": tool_use.input,
                        }));
                    }
                    MessageContent::ToolResult(result) => {
                        content.push(json!({
                            "type": "tool_result",
                            "tool_use_id": result.tool_use_id,
                            "content": result.content,
                            "is_error": result.is_error,
                        }));
                    }
                }
            }

            if !content.is_empty() {
                anthropic_messages.push(json!({
                    "role": role,
                    "content": content
                }));
            }
        }

        anthropic_messages
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        handle_response("Anthropic", response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    type Response = AnthropicResponse;

    async fn create_message(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<AnthropicResponse> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": Self::messages_to_anthropic_spec(messages),
            "max_tokens": max_tokens,
        });

        if let Some(object) = payload.as_object_mut() {
            if !system.is_empty() {
                object.insert("system".to_string(), json!(system));
            }
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(Self::tools_to_anthropic_spec(tools)));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
        }

        debug!(model = %self.config.model, messages = messages.len(), "anthropic request");
        let body = self.post(payload).await?;
        check_error_object("Anthropic", &body)?;

        serde_json::from_value(body)
            .map_err(|e| anyhow!("Invalid response format from Anthropic API: {}", e))
    }

    fn extract_text_and_tool_calls(&self, response: &AnthropicResponse) -> Extracted {
        let mut text_blocks = Vec::new();
        let mut tool_calls = Vec::new();
        for block in &response.content {
            match block {
                AnthropicContentBlock::Text { text } => text_blocks.push(text.clone()),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input.clone()))
                }
                AnthropicContentBlock::Unsupported => {}
            }
        }

        let stop_reason = match response.stop_reason.as_deref() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let input = response.usage.input_tokens;
        let output = response.usage.output_tokens;
        let total = match (input, output) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };

        Extracted {
            text_blocks,
            tool_calls,
            stop_reason,
            usage: Usage::new(input, output, total),
        }
    }

    fn format_assistant_message(&self, response: &AnthropicResponse) -> Message {
        response
            .content
            .iter()
            .fold(Message::assistant(), |message, block| match block {
                AnthropicContentBlock::Text { text } => message.with_text(text),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    message.with_tool_use(id, name, input.clone())
                }
                AnthropicContentBlock::Unsupported => message,
            })
    }
}
