use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::{Message, ToolResult};
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add another call's usage into this running total
    pub fn accumulate(&mut self, other: &Usage) {
        fn add(total: &mut Option<i32>, value: Option<i32>) {
            if let Some(value) = value {
                *total = Some(total.unwrap_or(0) + value);
            }
        }
        add(&mut self.input_tokens, other.input_tokens);
        add(&mut self.output_tokens, other.output_tokens);
        add(&mut self.total_tokens, other.total_tokens);
    }
}

/// Why the model stopped generating, normalized across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    MaxTokens,
}

/// The parts of a response the agent loop acts on
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text_blocks: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// Base trait for AI providers (Anthropic, OpenAI, Gemini)
///
/// Each provider keeps its own response schema and translates the canonical
/// conversation into its wire format on every request.
#[async_trait]
pub trait Provider: Send + Sync {
    type Response: Send + Sync;

    /// Send the conversation and return the provider's decoded response
    async fn create_message(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<Self::Response>;

    fn extract_text_and_tool_calls(&self, response: &Self::Response) -> Extracted;

    /// The response as a canonical assistant message, ready to append to history
    fn format_assistant_message(&self, response: &Self::Response) -> Message;

    /// Tool results as the canonical user turn that answers them
    fn format_tool_results(&self, results: &[ToolResult]) -> Message {
        results.iter().fold(Message::user(), |message, result| {
            message.with_tool_result(&result.tool_use_id, &result.content, result.is_error)
        })
    }
}

/// One model round trip, already normalized
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub message: Message,
    pub extracted: Extracted,
}

/// Object-safe face of [`Provider`], so the loop can hold any provider behind an `Arc`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<ModelTurn>;

    fn format_tool_results(&self, results: &[ToolResult]) -> Message;
}

#[async_trait]
impl<P> ModelClient for P
where
    P: Provider,
{
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<ModelTurn> {
        let response = self
            .create_message(system, messages, tools, max_tokens)
            .await?;
        Ok(ModelTurn {
            message: self.format_assistant_message(&response),
            extracted: self.extract_text_and_tool_calls(&response),
        })
    }

    fn format_tool_results(&self, results: &[ToolResult]) -> Message {
        Provider::format_tool_results(self, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_accumulate() {
        let mut total = Usage::default();
        total.accumulate(&Usage::new(Some(10), Some(20), Some(30)));
        total.accumulate(&Usage::new(Some(1), None, Some(1)));
        assert_eq!(total, Usage::new(Some(11), Some(20), Some(31)));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let json_value = serde_json::to_value(&usage)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["total_tokens"], json!(30));
        Ok(())
    }
}
