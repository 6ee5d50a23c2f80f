//! Agent Runtime (spec.md §4.3): the single end-to-end turn handler shared
//! by every channel adapter via the [`crate::command_router::CommandRouter`].
//!
//! Grounded on `chainclaw-skills::registry`'s `SkillRegistry` for the tool
//! catalogue and on `chainclaw-pipeline`'s pattern of catching a stage's
//! failure into a plain-English message rather than letting it abort the
//! whole turn (spec.md §4.3: "Skill exceptions are caught and converted to
//! a user-visible ... string without aborting subsequent intents").

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_providers::EmbeddingProvider;
use chainclaw_skills::SkillRegistry;
use chainclaw_types::channel::ChannelContext;
use chainclaw_types::skill::{SkillContext, SkillResult};
use chainclaw_types::user::{ConversationRole, Preferences};
use futures::FutureExt;

use crate::intent_parser::IntentParser;

/// Bounded conversation window fed to the Intent Parser (spec.md §4.3 step
/// 2). Distinct from [`chainclaw_types::user::CONVERSATION_HISTORY_CAP`],
/// which bounds total retained rows; this bounds how many of them are
/// replayed into a single prompt.
const HISTORY_WINDOW: usize = 20;

/// How many semantic-memory chunks are recalled per turn (spec.md §3
/// "Memory chunk"). Kept small: these are appended to the Intent Parser's
/// context alongside the recent-history window, not a replacement for it.
const RECALL_TOP_K: usize = 3;

pub struct AgentRuntime {
    store: Arc<Store>,
    parser: IntentParser,
    skills: SkillRegistry,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

impl AgentRuntime {
    pub fn new(store: Arc<Store>, parser: IntentParser, skills: SkillRegistry) -> Self {
        Self { store, parser, skills, embeddings: None }
    }

    /// Enables semantic recall: each turn's message is embedded and stored
    /// as a memory chunk, and the top [`RECALL_TOP_K`] similar past chunks
    /// are folded into the Intent Parser's context. Absent an
    /// [`EmbeddingProvider`], the runtime still works off recent history
    /// alone (spec.md §1: degraded operation without an external
    /// collaborator is not an error).
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    /// Runs one full turn for `channel`'s user and returns the text that
    /// should be sent back (spec.md §4.3 steps 1-7).
    pub async fn run_turn(
        &self,
        channel: Arc<dyn ChannelContext>,
        wallet_address: Option<String>,
        chain_ids: Vec<u64>,
        preferences: Preferences,
        text: &str,
    ) -> String {
        let user_id = channel.user_id().to_string();

        let added = match self.store.add_message(&user_id, ConversationRole::User, text).await {
            Ok(entry) => entry,
            Err(err) => return format!("Sorry, I couldn't save your message: {err}"),
        };

        let history = match self.store.get_history(&user_id, HISTORY_WINDOW + 1).await {
            Ok(rows) => rows.into_iter().filter(|e| e.id != added.id).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };

        let recalled = self.recall_memory(&user_id, text).await;

        let skills = self.skills.list().await;
        let parsed = self.parser.parse(text, &history, &recalled, &skills).await;

        let reply = if parsed.clarification_needed {
            parsed.clarification_question.unwrap_or_else(|| "Could you clarify that?".to_string())
        } else if parsed.intents.iter().all(|i| i.action == "unknown") && parsed.conversational_reply.is_some() {
            parsed.conversational_reply.unwrap()
        } else {
            let ctx = SkillContext { user_id: user_id.clone(), wallet_address, chain_ids, preferences, channel: channel.clone() };
            let mut messages = Vec::new();
            for intent in parsed.intents.iter().filter(|i| i.action != "unknown") {
                messages.push(self.execute_intent(&intent.action, intent.params.clone(), &ctx).await);
            }
            if messages.is_empty() {
                parsed.conversational_reply.unwrap_or_else(|| "I'm not sure what to do with that.".to_string())
            } else {
                messages.join("\n\n")
            }
        };

        let _ = self.store.add_message(&user_id, ConversationRole::Assistant, &reply).await;
        self.remember_turn(&user_id, text).await;
        reply
    }

    /// Embeds and stores `text` as a semantic-memory chunk (spec.md §3), a
    /// no-op when no [`EmbeddingProvider`] is configured. Failures are
    /// logged, not surfaced: a missed memory write must never fail the
    /// turn whose reply the caller already has.
    async fn remember_turn(&self, user_id: &str, text: &str) {
        let Some(provider) = &self.embeddings else { return };
        match provider.embed(text).await {
            Ok(vector) => {
                if let Err(err) =
                    self.store.add_memory_chunk(user_id, "conversation", text, &vector, provider.model_id()).await
                {
                    tracing::warn!(error = %err, "failed to store memory chunk");
                }
            }
            Err(err) => tracing::warn!(error = %err, "embedding provider failed"),
        }
    }

    /// Recalls the top [`RECALL_TOP_K`] past memory chunks relevant to
    /// `text`, returning their plain text for the Intent Parser's context
    /// (spec.md §3). Empty when no [`EmbeddingProvider`] is configured or
    /// the embed/query call fails — semantic recall is an enhancement over
    /// the recent-history window, not a requirement for a turn to proceed.
    async fn recall_memory(&self, user_id: &str, text: &str) -> Vec<String> {
        let Some(provider) = &self.embeddings else { return Vec::new() };
        let query = match provider.embed(text).await {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(error = %err, "embedding provider failed during recall");
                return Vec::new();
            }
        };
        match self.store.recall(user_id, &query, RECALL_TOP_K).await {
            Ok(matches) => matches.into_iter().map(|(_, chunk)| chunk.text).collect(),
            Err(err) => {
                tracing::warn!(error = %err, "memory recall failed");
                Vec::new()
            }
        }
    }

    /// Invokes one named skill directly, bypassing intent parsing — used by
    /// the Command Router for slash commands that map to a single skill
    /// (spec.md §4.4 `/balance`).
    pub async fn run_skill_directly(&self, action: &str, params: serde_json::Value, ctx: &SkillContext) -> String {
        self.execute_intent(action, params, ctx).await
    }

    /// `(name, description)` for every registered skill, used by the
    /// Command Router's `/help` (spec.md §4.4).
    pub async fn list_skills(&self) -> Vec<(&'static str, &'static str)> {
        self.skills.list().await.iter().map(|s| (s.name(), s.description())).collect()
    }

    async fn execute_intent(&self, action: &str, params: serde_json::Value, ctx: &SkillContext) -> String {
        let Some(skill) = self.skills.get(action).await else {
            return format!("I don't know how to do \"{action}\" yet.");
        };

        let outcome = AssertUnwindSafe(skill.execute(params, ctx)).catch_unwind().await;
        match outcome {
            Ok(SkillResult { message, .. }) => message,
            Err(_) => format!("Failed to execute {action}: an unexpected error occurred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::{ChatMessage, ChatResponse, LlmProvider, ToolCall, ToolSchema};
    use chainclaw_types::skill::Skill;
    use serde_json::json;

    struct EchoChannel;
    #[async_trait]
    impl ChannelContext for EchoChannel {
        fn user_id(&self) -> &str {
            "u1"
        }
        fn channel_id(&self) -> &str {
            "c1"
        }
        fn platform(&self) -> &str {
            "test"
        }
        async fn send_reply(&self, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct StubBalanceSkill;
    #[async_trait]
    impl Skill for StubBalanceSkill {
        fn name(&self) -> &'static str {
            "balance"
        }
        fn description(&self) -> &'static str {
            "test balance skill"
        }
        fn parameter_schema(&self) -> serde_json::Value {
            json!({})
        }
        async fn execute(&self, _params: serde_json::Value, _ctx: &SkillContext) -> SkillResult {
            SkillResult::ok("you have 1 ETH")
        }
    }

    struct ToolCallingProvider;
    #[async_trait]
    impl LlmProvider for ToolCallingProvider {
        fn id(&self) -> &str {
            "stub"
        }
        async fn chat(&self, _messages: &[ChatMessage], _tools: Option<&[ToolSchema]>) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    name: crate::intent_parser::PARSE_INTENT_TOOL.to_string(),
                    arguments: json!({"intents": [{"action": "balance", "confidence": 1.0}], "clarificationNeeded": false}),
                }],
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn turn_executes_matched_skill_and_records_history() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let skills = SkillRegistry::new();
        skills.register(Arc::new(StubBalanceSkill)).await.unwrap();
        let parser = IntentParser::new(Arc::new(ToolCallingProvider));
        let runtime = AgentRuntime::new(store.clone(), parser, skills);

        let reply = runtime
            .run_turn(Arc::new(EchoChannel), None, vec![1], Preferences::default(), "what's my balance?")
            .await;
        assert_eq!(reply, "you have 1 ETH");

        let history = store.get_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, ConversationRole::Assistant);
    }

    #[tokio::test]
    async fn unmatched_intent_action_returns_placeholder() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let skills = SkillRegistry::new();
        let parser = IntentParser::new(Arc::new(ToolCallingProvider));
        let runtime = AgentRuntime::new(store, parser, skills);

        let reply = runtime
            .run_turn(Arc::new(EchoChannel), None, vec![1], Preferences::default(), "what's my balance?")
            .await;
        assert!(reply.contains("don't know how"));
    }
}
