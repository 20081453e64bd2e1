use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{Extracted, Provider, StopReason, Usage};
use super::configs::GeminiProviderConfig;
use super::utils::{check_error_object, handle_response};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    pub prompt_token_count: Option<i32>,
    pub candidates_token_count: Option<i32>,
    pub total_token_count: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: GeminiUsageMetadata,
}

/// A decoded response plus the call ids minted for its function calls,
/// one per `functionCall` part in order.
#[derive(Debug, Clone)]
pub struct GeminiResponse {
    pub raw: GenerateContentResponse,
    pub call_ids: Vec<String>,
}

impl GeminiResponse {
    fn new(raw: GenerateContentResponse) -> Self {
        let call_ids = Self::parts_of(&raw)
            .iter()
            .filter(|part| matches!(part, GeminiPart::FunctionCall { .. }))
            .map(|_| format!("call_{}", Uuid::new_v4().simple()))
            .collect();
        Self { raw, call_ids }
    }

    fn parts_of(raw: &GenerateContentResponse) -> &[GeminiPart] {
        raw.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or(&[])
    }

    fn parts(&self) -> &[GeminiPart] {
        Self::parts_of(&self.raw)
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts()
            .iter()
            .filter_map(|part| match part {
                GeminiPart::FunctionCall { function_call } => Some(function_call),
                _ => None,
            })
            .zip(self.call_ids.iter())
            .map(|(call, id)| ToolCall::new(id, &call.name, call.args.clone()))
            .collect()
    }
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

/// Convert the canonical conversation into Gemini `contents`.
///
/// Gemini answers a call by function name, so each tool result looks up the
/// name of the tool use it pairs with.
pub fn messages_to_gemini_spec(messages: &[Message]) -> Vec<GeminiContent> {
    let mut names: HashMap<&str, &str> = HashMap::new();
    let mut contents = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };

        let mut parts = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        parts.push(GeminiPart::Text {
                            text: text.text.clone(),
                        });
                    }
                }
                MessageContent::ToolUse(tool_use) => {
                    names.insert(&tool_use.id, &tool_use.name);
                    parts.push(GeminiPart::FunctionCall {
                        function_call: GeminiFunctionCall {
                            name: tool_use.name.clone(),
                            args: tool_use.input.clone(),
                        },
                    });
                }
                MessageContent::ToolResult(result) => {
                    let name = match names.get(result.tool_use_id.as_str()) {
                        Some(name) => name.to_string(),
                        None => {
                            warn!(id = %result.tool_use_id, "tool result without a matching tool use");
                            result.tool_use_id.clone()
                        }
                    };
                    let key = if result.is_error { "error" } else { "content" };
                    parts.push(GeminiPart::FunctionResponse {
                        function_response: GeminiFunctionResponse {
                            name,
                            response: json!({ key: result.content }),
                        },
                    });
                }
            }
        }

        if !parts.is_empty() {
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }
    }

    contents
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn tools_to_gemini_spec(tools: &[Tool]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                })
            })
            .collect();
        json!([{ "functionDeclarations": declarations }])
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.config.api_key)])
            .json(&payload)
            .send()
            .await?;

        handle_response("Gemini", response).await
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    type Response = GeminiResponse;

    async fn create_message(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<GeminiResponse> {
        let mut generation_config = json!({ "maxOutputTokens": max_tokens });
        if let Some(temp) = self.config.temperature {
            generation_config["temperature"] = json!(temp);
        }

        let mut payload = json!({
            "contents": messages_to_gemini_spec(messages),
            "generationConfig": generation_config,
        });
        if !system.is_empty() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if !tools.is_empty() {
            payload["tools"] = Self::tools_to_gemini_spec(tools);
        }

        debug!(model = %self.config.model, messages = messages.len(), "gemini request");
        let body = self.post(payload).await?;
        check_error_object("Gemini", &body)?;

        let raw: GenerateContentResponse = serde_json::from_value(body)
            .map_err(|e| anyhow!("Invalid response format from Gemini API: {}", e))?;
        if raw.candidates.is_empty() {
            return Err(anyhow!("Gemini API returned no candidates"));
        }
        Ok(GeminiResponse::new(raw))
    }

    fn extract_text_and_tool_calls(&self, response: &GeminiResponse) -> Extracted {
        let text_blocks = response
            .parts()
            .iter()
            .filter_map(|part| match part {
                GeminiPart::Text { text } if !text.is_empty() => Some(text.clone()),
                _ => None,
            })
            .collect();

        let tool_calls = response.tool_calls();
        let finish_reason = response
            .raw
            .candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref());
        // Gemini reports STOP even when it asks for function calls
        let stop_reason = if !tool_calls.is_empty() {
            StopReason::ToolUse
        } else if finish_reason == Some("MAX_TOKENS") {
            StopReason::MaxTokens
        } else {
            StopReason::EndTurn
        };

        let usage = &response.raw.usage_metadata;
        Extracted {
            text_blocks,
            tool_calls,
            stop_reason,
            usage: Usage::new(
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count,
            ),
        }
    }

    fn format_assistant_message(&self, response: &GeminiResponse) -> Message {
        let mut ids = response.call_ids.iter();
        let mut message = Message::assistant();
        for part in response.parts() {
            match part {
                GeminiPart::Text { text } if !text.is_empty() => {
                    message = message.with_text(text);
                }
                GeminiPart::FunctionCall { function_call } => {
                    if let Some(id) = ids.next() {
                        message = message.with_tool_use(
                            id,
                            &function_call.name,
                            function_call.args.clone(),
                        );
                    }
                }
                _ => {}
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::ModelClient;
    use std::collections::HashSet;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-1.5-pro";

    async fn setup_mock_server(response_body: Value) -> (MockServer, GeminiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{}:generateContent", MODEL)))
            .and(query_param("key", "test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = GeminiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: MODEL.to_string(),
            temperature: None,
        };

        let provider = GeminiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let (_, provider) = setup_mock_server(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hi there"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }))
        .await;

        let turn = provider
            .complete("sys", &[Message::user().with_text("hello")], &[], 256)
            .await?;
        assert_eq!(turn.message.text(), "Hi there");
        assert_eq!(turn.extracted.stop_reason, StopReason::EndTurn);
        assert_eq!(turn.extracted.usage, Usage::new(Some(4), Some(2), Some(6)));
        Ok(())
    }

    #[tokio::test]
    async fn test_function_calls_get_unique_matching_ids() -> Result<()> {
        let (_, provider) = setup_mock_server(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "read_file", "args": {"path": "a"}}},
                    {"functionCall": {"name": "read_file", "args": {"path": "b"}}}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .await;

        let turn = provider
            .complete("", &[Message::user().with_text("read both")], &[], 256)
            .await?;
        assert_eq!(turn.extracted.stop_reason, StopReason::ToolUse);

        let extracted_ids: Vec<&str> = turn
            .extracted
            .tool_calls
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        let message_ids: Vec<&str> = turn
            .message
            .tool_uses()
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(extracted_ids, message_ids);
        assert!(extracted_ids.iter().all(|id| id.starts_with("call_")));
        assert_eq!(extracted_ids.iter().collect::<HashSet<_>>().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_shape() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{}:generateContent", MODEL)))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "sys"}]},
                "generationConfig": {"maxOutputTokens": 99},
                "tools": [{"functionDeclarations": [{"name": "grep"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = GeminiProvider::new(GeminiProviderConfig {
            host: mock_server.uri(),
            api_key: "k".to_string(),
            model: MODEL.to_string(),
            temperature: None,
        })?;
        let tools = [Tool::new("grep", "search", json!({"type": "object"}))];
        let turn = provider
            .complete("sys", &[Message::user().with_text("hi")], &tools, 99)
            .await?;
        assert_eq!(turn.message.text(), "ok");
        Ok(())
    }

    #[test]
    fn test_function_response_uses_tool_name() {
        let messages = vec![
            Message::user().with_text("go"),
            Message::assistant().with_tool_use("call_1", "grep", json!({"pattern": "x"})),
            Message::user()
                .with_tool_result("call_1", "a.rs:1: x", false)
                .with_tool_result("call_missing", "Error: ?", true),
        ];
        let contents = serde_json::to_value(messages_to_gemini_spec(&messages)).unwrap();
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "grep");
        assert_eq!(contents[2]["role"], "user");
        let response = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "grep");
        assert_eq!(response["response"]["content"], "a.rs:1: x");
        assert_eq!(
            contents[2]["parts"][1]["functionResponse"]["response"]["error"],
            "Error: ?"
        );
    }
}
