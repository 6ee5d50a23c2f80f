//! Intent Parser (spec.md §4.2): turns free text plus a bounded
//! conversation window into structured skill intents via a reserved
//! `parse_intent` tool call.
//!
//! Grounded on `chainclaw-providers::llm`'s uniform `chat(messages, tools)
//! -> {content, tool_calls, usage}` boundary; this module only shapes the
//! system prompt and the `parse_intent` tool schema, then decodes whichever
//! tool call (if any) the model chose to make.

use chainclaw_providers::{ChatMessage, ChatResponse, LlmProvider, ToolSchema};
use chainclaw_types::skill::Skill;
use chainclaw_types::user::{ConversationEntry, ConversationRole};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PARSE_INTENT_TOOL: &str = "parse_intent";

/// One structured action the caller asked for (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub raw_text: String,
}

fn default_confidence() -> f64 {
    1.0
}

/// Output of one parse call (spec.md §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentParseResult {
    pub intents: Vec<Intent>,
    pub clarification_needed: bool,
    pub clarification_question: Option<String>,
    pub conversational_reply: Option<String>,
}

impl IntentParseResult {
    fn clarification(question: impl Into<String>) -> Self {
        Self {
            intents: Vec::new(),
            clarification_needed: true,
            clarification_question: Some(question.into()),
            conversational_reply: None,
        }
    }

    fn conversational(reply: String, raw_text: &str) -> Self {
        Self {
            intents: vec![Intent {
                action: "unknown".to_string(),
                params: json!({}),
                confidence: 1.0,
                raw_text: raw_text.to_string(),
            }],
            clarification_needed: false,
            clarification_question: None,
            conversational_reply: Some(reply),
        }
    }
}

/// Stateless (spec.md §4.2: "all history is passed in") — holds only the
/// provider and the skill catalogue it advertises as tools.
pub struct IntentParser {
    provider: Arc<dyn LlmProvider>,
}

impl IntentParser {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// `history` is the bounded window already fetched by the caller
    /// (spec.md §4.3 step 2); `recalled` is semantic-memory chunk text
    /// folded in ahead of the recent-history window (spec.md §3, empty
    /// when no [`chainclaw_providers::EmbeddingProvider`] is configured);
    /// `skills` is the live registry contents.
    pub async fn parse(
        &self,
        user_text: &str,
        history: &[ConversationEntry],
        recalled: &[String],
        skills: &[Arc<dyn Skill>],
    ) -> IntentParseResult {
        let messages = build_messages(user_text, history, recalled, skills);
        let tools = [parse_intent_tool_schema(skills)];

        match self.provider.chat(&messages, Some(&tools)).await {
            Ok(response) => decode_response(response, user_text),
            Err(err) => {
                tracing::warn!(error = %err, "intent parser: llm call failed");
                IntentParseResult::clarification("I'm having trouble understanding that right now — could you rephrase?")
            }
        }
    }
}

fn build_messages(
    user_text: &str,
    history: &[ConversationEntry],
    recalled: &[String],
    skills: &[Arc<dyn Skill>],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt(skills))];
    if !recalled.is_empty() {
        let joined = recalled.join("\n---\n");
        messages.push(ChatMessage::system(format!("Relevant memory from earlier conversations:\n{joined}")));
    }
    for entry in history {
        match entry.role {
            ConversationRole::User => messages.push(ChatMessage::user(&entry.content)),
            ConversationRole::Assistant => messages.push(ChatMessage::assistant(&entry.content)),
            ConversationRole::System => messages.push(ChatMessage::system(&entry.content)),
        }
    }
    messages.push(ChatMessage::user(user_text));
    messages
}

fn system_prompt(skills: &[Arc<dyn Skill>]) -> String {
    let mut catalogue = String::new();
    for skill in skills {
        catalogue.push_str(&format!("- {}: {}\n", skill.name(), skill.description()));
    }
    format!(
        "You are a DeFi operations assistant. Decide which of the available \
         skills (if any) satisfy the user's request, then call `{PARSE_INTENT_TOOL}` \
         with the structured result. If nothing in the catalogue applies, reply \
         in plain text instead.\n\nAvailable skills:\n{catalogue}"
    )
}

fn parse_intent_tool_schema(skills: &[Arc<dyn Skill>]) -> ToolSchema {
    let action_names: Vec<&str> = skills.iter().map(|s| s.name()).collect();
    ToolSchema {
        name: PARSE_INTENT_TOOL.to_string(),
        description: "Report the user's parsed intents, or ask for clarification.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "intents": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": {"type": "string", "enum": action_names},
                            "params": {"type": "object"},
                            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                            "rawText": {"type": "string"}
                        },
                        "required": ["action", "confidence"]
                    }
                },
                "clarificationNeeded": {"type": "boolean"},
                "clarificationQuestion": {"type": "string"},
                "conversationalReply": {"type": "string"}
            },
            "required": ["intents", "clarificationNeeded"]
        }),
    }
}

fn decode_response(response: ChatResponse, user_text: &str) -> IntentParseResult {
    let Some(call) = response.tool_calls.iter().find(|c| c.name == PARSE_INTENT_TOOL) else {
        return IntentParseResult::conversational(
            if response.content.is_empty() { "I'm not sure how to help with that.".to_string() } else { response.content },
            user_text,
        );
    };

    let args = &call.arguments;
    let intents = args
        .get("intents")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    let action = v.get("action").and_then(Value::as_str)?.to_string();
                    Some(Intent {
                        action,
                        params: v.get("params").cloned().unwrap_or(json!({})),
                        confidence: v.get("confidence").and_then(Value::as_f64).unwrap_or(1.0),
                        raw_text: v.get("rawText").and_then(Value::as_str).unwrap_or(user_text).to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    IntentParseResult {
        intents,
        clarification_needed: args.get("clarificationNeeded").and_then(Value::as_bool).unwrap_or(false),
        clarification_question: args.get("clarificationQuestion").and_then(Value::as_str).map(str::to_string),
        conversational_reply: args.get("conversationalReply").and_then(Value::as_str).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::ToolCall;

    struct StubProvider {
        response: ChatResponse,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }
        async fn chat(&self, _messages: &[ChatMessage], _tools: Option<&[ToolSchema]>) -> anyhow::Result<ChatResponse> {
            Ok(self.response.clone())
        }
    }

    fn no_skills() -> Vec<Arc<dyn Skill>> {
        Vec::new()
    }

    #[tokio::test]
    async fn plain_text_response_becomes_unknown_intent() {
        let provider = Arc::new(StubProvider { response: ChatResponse { content: "hi there".into(), ..Default::default() } });
        let parser = IntentParser::new(provider);
        let result = parser.parse("hello", &[], &[], &no_skills()).await;
        assert_eq!(result.intents.len(), 1);
        assert_eq!(result.intents[0].action, "unknown");
        assert_eq!(result.conversational_reply.as_deref(), Some("hi there"));
        assert!(!result.clarification_needed);
    }

    #[tokio::test]
    async fn tool_call_decodes_into_intents() {
        let response = ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                name: PARSE_INTENT_TOOL.to_string(),
                arguments: json!({
                    "intents": [{"action": "balance", "params": {"chain_id": 1}, "confidence": 0.9}],
                    "clarificationNeeded": false
                }),
            }],
            usage: None,
        };
        let provider = Arc::new(StubProvider { response });
        let parser = IntentParser::new(provider);
        let result = parser.parse("what's my balance", &[], &[], &no_skills()).await;
        assert_eq!(result.intents.len(), 1);
        assert_eq!(result.intents[0].action, "balance");
        assert!(!result.clarification_needed);
    }

    #[tokio::test]
    async fn llm_failure_requests_clarification_without_surfacing_error() {
        struct FailingProvider;
        #[async_trait]
        impl LlmProvider for FailingProvider {
            fn id(&self) -> &str {
                "failing"
            }
            async fn chat(&self, _m: &[ChatMessage], _t: Option<&[ToolSchema]>) -> anyhow::Result<ChatResponse> {
                anyhow::bail!("connection reset")
            }
        }
        let parser = IntentParser::new(Arc::new(FailingProvider));
        let result = parser.parse("swap 1 eth", &[], &[], &no_skills()).await;
        assert!(result.clarification_needed);
        assert!(result.clarification_question.unwrap().contains("trouble"));
        assert!(result.intents.is_empty());
    }
}
