use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use super::tool::ToolCall;
use super::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn new<S: Into<String>, C: Into<String>>(tool_use_id: S, content: C, is_error: bool) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_use<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        MessageContent::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn tool_result<I: Into<String>, C: Into<String>>(
        tool_use_id: I,
        content: C,
        is_error: bool,
    ) -> Self {
        MessageContent::ToolResult(ToolResult::new(tool_use_id, content, is_error))
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        if let MessageContent::ToolUse(ref tool_use) = self {
            Some(tool_use)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        if let MessageContent::ToolResult(ref tool_result) = self {
            Some(tool_result)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool use to the message
    pub fn with_tool_use<I: Into<String>, N: Into<String>>(
        self,
        id: I,
        name: N,
        input: Value,
    ) -> Self {
        self.with_content(MessageContent::tool_use(id, name, input))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<I: Into<String>, C: Into<String>>(
        self,
        tool_use_id: I,
        content: C,
        is_error: bool,
    ) -> Self {
        self.with_content(MessageContent::tool_result(tool_use_id, content, is_error))
    }

    /// All text blocks joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content.iter().filter_map(|c| c.as_tool_use()).collect()
    }

    pub fn tool_results(&self) -> Vec<&ToolResult> {
        self.content
            .iter()
            .filter_map(|c| c.as_tool_result())
            .collect()
    }

    /// Tool uses as dispatchable calls, in the order the model emitted them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_uses()
            .into_iter()
            .map(|t| ToolCall::new(t.id.clone(), t.name.clone(), t.input.clone()))
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, MessageContent::ToolUse(_)))
    }

    /// Drop tool use blocks, for an assistant turn that ends the loop without
    /// its calls being executed
    pub fn without_tool_uses(mut self) -> Self {
        self.content
            .retain(|c| !matches!(c, MessageContent::ToolUse(_)));
        self
    }
}

/// Check that `results` answers every tool use in `assistant` exactly once, and nothing else.
pub fn validate_tool_pairing(assistant: &Message, results: &Message) -> Result<(), ValidationError> {
    let outstanding: HashSet<&str> = assistant
        .tool_uses()
        .iter()
        .map(|t| t.id.as_str())
        .collect();

    let mut answered: HashSet<&str> = HashSet::new();
    for result in results.tool_results() {
        let id = result.tool_use_id.as_str();
        if !outstanding.contains(id) {
            return Err(ValidationError::UnknownToolResult { id: id.to_string() });
        }
        if !answered.insert(id) {
            return Err(ValidationError::DuplicateToolResult { id: id.to_string() });
        }
    }

    for tool_use in assistant.tool_uses() {
        if !answered.contains(tool_use.id.as_str()) {
            return Err(ValidationError::MissingToolResult {
                id: tool_use.id.clone(),
            });
        }
    }
    Ok(())
}
