use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{Extracted, Provider, StopReason, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{check_error_object, handle_response, parse_tool_arguments, tools_to_openai_spec};
use crate::models::message::{Message, MessageContent};
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiResponseMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    #[serde(default)]
    pub message: OpenAiResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    pub choices: Vec<OpenAiChoice>,
    #[serde(default)]
    pub usage: OpenAiUsage,
}

impl OpenAiResponse {
    fn message(&self) -> Option<&OpenAiResponseMessage> {
        self.choices.first().map(|choice| &choice.message)
    }

    fn tool_calls(&self) -> &[OpenAiToolCall] {
        self.message()
            .and_then(|message| message.tool_calls.as_deref())
            .unwrap_or(&[])
    }
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

/// Convert internal Message format to OpenAI's API message specification
///
/// Every tool result becomes its own `tool` role message.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });
        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(block) => {
                    if !block.text.is_empty() {
                        text.push(block.text.as_str());
                    }
                }
                MessageContent::ToolUse(tool_use) => {
                    tool_calls.push(json!({
                        "id": tool_use.id,
                        "type": "function",
                        "function": {
                            "name": tool_use.name,
                            "arguments": tool_use.input.to_string(),
                        }
                    }));
                }
                MessageContent::ToolResult(result) => {
                    output.push(json!({
                        "role": "tool",
                        "content": result.content,
                        "tool_call_id": result.tool_use_id
                    }));
                }
            }
        }

        if !text.is_empty() {
            converted["content"] = json!(text.join("\n"));
        }
        if !tool_calls.is_empty() {
            converted["tool_calls"] = json!(tool_calls);
        }

        // Tool messages must directly follow the assistant message that requested them,
        // so any text in a results turn goes after them.
        messages_spec.extend(output);
        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            messages_spec.push(converted);
        }
    }

    messages_spec
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        handle_response("OpenAI", response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    type Response = OpenAiResponse;

    async fn create_message(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<OpenAiResponse> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "max_tokens": max_tokens,
        });

        if let Some(object) = payload.as_object_mut() {
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
        }

        debug!(model = %self.config.model, messages = messages.len(), "openai request");
        let body = self.post(payload).await?;
        // Raise specific error if context length is exceeded
        check_error_object("OpenAI", &body)?;

        let response: OpenAiResponse = serde_json::from_value(body)
            .map_err(|e| anyhow!("Invalid response format from OpenAI API: {}", e))?;
        if response.choices.is_empty() {
            return Err(anyhow!("OpenAI API returned no choices"));
        }
        Ok(response)
    }

    fn extract_text_and_tool_calls(&self, response: &OpenAiResponse) -> Extracted {
        let text_blocks = response
            .message()
            .and_then(|message| message.content.clone())
            .filter(|text| !text.is_empty())
            .into_iter()
            .collect();

        let tool_calls: Vec<ToolCall> = response
            .tool_calls()
            .iter()
            .map(|call| {
                ToolCall::new(
                    &call.id,
                    &call.function.name,
                    parse_tool_arguments(&call.function.arguments),
                )
            })
            .collect();

        let finish_reason = response
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref());
        let stop_reason = match finish_reason {
            Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
            _ if !tool_calls.is_empty() => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let usage = &response.usage;
        let total_tokens = usage.total_tokens.or_else(|| {
            match (usage.prompt_tokens, usage.completion_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            }
        });

        Extracted {
            text_blocks,
            tool_calls,
            stop_reason,
            usage: Usage::new(usage.prompt_tokens, usage.completion_tokens, total_tokens),
        }
    }

    fn format_assistant_message(&self, response: &OpenAiResponse) -> Message {
        let mut message = Message::assistant();
        if let Some(text) = response.message().and_then(|m| m.content.as_deref()) {
            if !text.is_empty() {
                message = message.with_text(text);
            }
        }
        for call in response.tool_calls() {
            message = message.with_tool_use(
                &call.id,
                &call.function.name,
                parse_tool_arguments(&call.function.arguments),
            );
        }
        message
    }
}
