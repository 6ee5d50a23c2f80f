//! Uniform LLM chat boundary (spec.md §6: "three providers are recognised
//! ... all must surface a uniform tool-call response").
//!
//! Grounded on the teacher's `Provider` trait and its per-vendor HTTP
//! adapters (`OpenAICompatibleProvider`, `AnthropicProvider`), generalised
//! from text-completion/streaming to a single `chat` call that always
//! returns `{content, tool_calls, usage}` regardless of vendor wire format.

use async_trait::async_trait;
use chainclaw_retry::{fetch_with_retry, BackoffPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }
}

/// A tool (skill) signature offered to the model, derived from the skill
/// registry (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One tool invocation the model asked to make.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Uniform chat response regardless of vendor (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .expect("reqwest client")
}

/// Remote anthropic-style provider (Messages API + `tools`).
pub struct AnthropicStyleProvider {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    client: reqwest::Client,
}

impl AnthropicStyleProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com/v1".into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicStyleProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let (system, rest): (Vec<_>, Vec<_>) =
            messages.iter().partition(|m| m.role == "system");
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("\n"),
            "messages": rest.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
            "tools": tools.map(|t| t.iter().map(|s| json!({
                "name": s.name,
                "description": s.description,
                "input_schema": s.parameters,
            })).collect::<Vec<_>>()),
        });

        let url = format!("{}/messages", self.base_url);
        let resp = fetch_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
                    .send()
            },
            3,
            BackoffPolicy::default(),
            None,
        )
        .await
        .map_err(|e| anyhow::anyhow!("anthropic chat failed: {e}"))?;

        let value: Value = resp.json().await?;
        parse_anthropic_response(&value)
    }
}

fn parse_anthropic_response(value: &Value) -> anyhow::Result<ChatResponse> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(blocks) = value.get("content").and_then(Value::as_array) {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(Value::as_str) {
                        content.push_str(t);
                    }
                }
                Some("tool_use") => {
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                    let args = block.get("input").cloned().unwrap_or(json!({}));
                    tool_calls.push(ToolCall { name: name.to_string(), arguments: args });
                }
                _ => {}
            }
        }
    }
    let usage = value.get("usage").map(|u| Usage {
        prompt_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        completion_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    });
    Ok(ChatResponse { content, tool_calls, usage })
}

/// Remote openai-style provider (Chat Completions API + `tools`/function
/// calling); also covers any OpenAI-compatible gateway (Groq, OpenRouter,
/// Azure OpenAI) by swapping `base_url`.
pub struct OpenAiStyleProvider {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    client: reqwest::Client,
}

impl OpenAiStyleProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiStyleProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let body = json!({
            "model": self.model,
            "messages": messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
            "tools": tools.map(|t| t.iter().map(|s| json!({
                "type": "function",
                "function": {"name": s.name, "description": s.description, "parameters": s.parameters},
            })).collect::<Vec<_>>()),
        });

        let url = format!("{}/chat/completions", self.base_url);
        let resp = fetch_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
            },
            3,
            BackoffPolicy::default(),
            None,
        )
        .await
        .map_err(|e| anyhow::anyhow!("openai chat failed: {e}"))?;

        let value: Value = resp.json().await?;
        parse_openai_response(&value)
    }
}

fn parse_openai_response(value: &Value) -> anyhow::Result<ChatResponse> {
    let message = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .cloned()
        .unwrap_or(json!({}));
    let content = message.get("content").and_then(Value::as_str).unwrap_or("").to_string();
    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let Some(func) = call.get("function") else { continue };
            let name = func.get("name").and_then(Value::as_str).unwrap_or_default();
            let args_str = func.get("arguments").and_then(Value::as_str).unwrap_or("{}");
            let args: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
            tool_calls.push(ToolCall { name: name.to_string(), arguments: args });
        }
    }
    let usage = value.get("usage").map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
    });
    Ok(ChatResponse { content, tool_calls, usage })
}

/// Local ollama-style provider (`/api/chat`, no API key).
pub struct OllamaStyleProvider {
    pub model: String,
    pub base_url: String,
    client: reqwest::Client,
}

impl OllamaStyleProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), base_url: "http://localhost:11434".into(), client: http_client() }
    }
}

#[async_trait]
impl LlmProvider for OllamaStyleProvider {
    fn id(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
            "tools": tools.map(|t| t.iter().map(|s| json!({
                "type": "function",
                "function": {"name": s.name, "description": s.description, "parameters": s.parameters},
            })).collect::<Vec<_>>()),
        });

        let url = format!("{}/api/chat", self.base_url);
        let resp = fetch_with_retry(|| self.client.post(&url).json(&body).send(), 2, BackoffPolicy::default(), None)
            .await
            .map_err(|e| anyhow::anyhow!("ollama chat failed: {e}"))?;

        let value: Value = resp.json().await?;
        // ollama nests the single message at top level, not in a choices array.
        parse_openai_response(&json!({"choices": [{"message": value.get("message").cloned().unwrap_or(json!({}))}]}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_anthropic_tool_use_block() {
        let value = json!({
            "content": [
                {"type": "text", "text": "checking balance"},
                {"type": "tool_use", "name": "balance", "input": {"chain_id": 1}},
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let response = parse_anthropic_response(&value).unwrap();
        assert_eq!(response.content, "checking balance");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "balance");
        assert_eq!(response.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn parses_openai_function_call() {
        let value = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{"function": {"name": "swap", "arguments": "{\"from\":\"ETH\"}"}}],
            }}],
        });
        let response = parse_openai_response(&value).unwrap();
        assert_eq!(response.tool_calls[0].name, "swap");
        assert_eq!(response.tool_calls[0].arguments["from"], "ETH");
    }

    #[test]
    fn plain_text_response_has_no_tool_calls() {
        let value = json!({"choices": [{"message": {"content": "hello there"}}]});
        let response = parse_openai_response(&value).unwrap();
        assert_eq!(response.content, "hello there");
        assert!(response.tool_calls.is_empty());
    }
}
