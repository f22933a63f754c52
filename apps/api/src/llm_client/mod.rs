/// LLM Client: the single point of entry for all completion-endpoint calls.
///
/// ARCHITECTURAL RULE: No other module may call the model provider directly.
/// Everything goes through [`CompletionEndpoint`], which [`LlmClient`] implements
/// against an OpenAI-compatible `/chat/completions` API (Groq by default).
///
/// No retries happen here. Transient failures surface as [`LlmError`] and the
/// caller decides what to do with them.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod prompts;
pub mod types;

pub use types::{AssistantTurn, ChatMessage, Role, ToolCallRequest, ToolDefinition};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("completion response contained no choices")]
    MissingChoice,
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Report generation: long-form output with tools enabled.
pub const REPORT_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.7,
    max_tokens: 4096,
};

/// Follow-up chat: short answers, no tools.
pub const CHAT_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.7,
    max_tokens: 500,
};

/// A language-model endpoint that can answer one completion round.
///
/// Passed explicitly to every caller so tests can substitute scripted endpoints.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    /// Requests one assistant turn. When `tools` is non-empty the endpoint runs
    /// in automatic tool-choice mode and may answer with tool calls.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        params: SamplingParams,
    ) -> Result<AssistantTurn, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionEndpoint for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        params: SamplingParams,
    ) -> Result<AssistantTurn, LlmError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: tools.iter().map(ToolDefinition::to_wire).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        parse_completion(&body)
    }
}

/// Extracts the first choice's assistant message from a raw response body.
fn parse_completion(body: &str) -> Result<AssistantTurn, LlmError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)?;

    if let Some(usage) = &parsed.usage {
        debug!(
            "Completion succeeded: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let message = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::MissingChoice)?
        .message;

    Ok(AssistantTurn {
        content: message.content,
        tool_calls: message.tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_top_nirf_colleges",
                            "arguments": "{\"category\":\"Engineering\",\"num\":4}"
                        }
                    }]
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 18}
        })
        .to_string();

        let turn = parse_completion(&body).unwrap();
        assert!(turn.content.is_none());
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "call_1");
        assert_eq!(turn.tool_calls[0].name, "get_top_nirf_colleges");
        assert_eq!(
            turn.tool_calls[0].arguments,
            "{\"category\":\"Engineering\",\"num\":4}"
        );
    }

    #[test]
    fn test_parse_completion_text_only() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "## Summary"}}]
        })
        .to_string();

        let turn = parse_completion(&body).unwrap();
        assert_eq!(turn.content.as_deref(), Some("## Summary"));
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_completion_without_choices_is_an_error() {
        let body = json!({"choices": []}).to_string();
        assert!(matches!(
            parse_completion(&body),
            Err(LlmError::MissingChoice)
        ));
    }

    #[test]
    fn test_request_enables_auto_tool_choice_only_with_tools() {
        let messages = vec![ChatMessage::user("hello")];
        let tools = vec![ToolDefinition {
            name: "get_market_trends".to_string(),
            description: "Market data".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];

        let with_tools = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            tools: tools.iter().map(ToolDefinition::to_wire).collect(),
            tool_choice: Some("auto"),
            temperature: REPORT_SAMPLING.temperature,
            max_tokens: REPORT_SAMPLING.max_tokens,
        };
        let value = serde_json::to_value(&with_tools).unwrap();
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "get_market_trends");

        let without_tools = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            tools: Vec::new(),
            tool_choice: None,
            temperature: CHAT_SAMPLING.temperature,
            max_tokens: CHAT_SAMPLING.max_tokens,
        };
        let value = serde_json::to_value(&without_tools).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert_eq!(value["max_tokens"], 500);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = LlmClient::new(
            "key".to_string(),
            "https://api.groq.com/openai/v1/".to_string(),
            "llama".to_string(),
        )
        .unwrap();
        assert_eq!(
            client.endpoint_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
