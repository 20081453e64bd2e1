use anyhow::{anyhow, Result};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

use crate::models::tool::Tool;

/// Map an HTTP response to its JSON body, or a turn-fatal error.
pub async fn handle_response(provider: &str, response: Response) -> Result<Value> {
    match response.status() {
        StatusCode::OK => {
            let text = response.text().await?;
            serde_json::from_str(&text)
                .map_err(|e| anyhow!("{} returned malformed JSON: {}", provider, e))
        }
        status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
            Err(anyhow!("Server error: {}", status))
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<Value>(&error_text) {
                if let Some(error) = body.get("error") {
                    if let Some(err) = check_context_length_error(error) {
                        return Err(err.into());
                    }
                }
            }
            Err(anyhow!("Request failed: {} - {}", status, error_text))
        }
    }
}

/// Reject a 200 body that still carries a provider `error` object.
pub fn check_error_object(provider: &str, body: &Value) -> Result<()> {
    if let Some(error) = body.get("error") {
        if let Some(err) = check_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("{} API error: {}", provider, error));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();

    let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("");
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        return Some(ContextLengthExceededError(message));
    }

    let lowered = message.to_lowercase();
    if lowered.contains("prompt is too long") || lowered.contains("exceeds the maximum number of tokens") {
        return Some(ContextLengthExceededError(message));
    }
    None
}

/// Decode a JSON-string tool argument, keeping unparseable input as `{"_raw": ...}`
/// so the call can still be answered.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(value) if value.is_object() => value,
        _ => json!({ "_raw": arguments }),
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}
