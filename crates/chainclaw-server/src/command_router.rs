//! Command Router (spec.md §4.4): the single fan-in point every channel
//! adapter feeds into. Maps slash commands to their handlers and anything
//! else to the [`AgentRuntime`], enforcing the per-user rate limit before
//! any skill call.
//!
//! Grounded on `tandem-server`'s HTTP-route-to-handler dispatch table,
//! generalized from axum routes to a platform-agnostic string match over
//! [`ChannelContext`] since spec.md §4.4 requires the router itself stay
//! transport-agnostic.

use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_types::channel::ChannelContext;
use chainclaw_types::skill::SkillContext;
use chainclaw_types::user::ConversationRole;

use crate::agent_runtime::AgentRuntime;
use crate::rate_limit::RateLimiter;

/// Security mode gate (spec.md §6 "security mode (`open`/`allowlist`) +
/// allowlist entries"), checked by the router ahead of the rate limit so an
/// unauthorized caller never consumes a legitimate user's bucket.
#[derive(Clone, Debug)]
pub enum SecurityPolicy {
    Open,
    Allowlist(std::collections::HashSet<String>),
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy::Open
    }
}

impl SecurityPolicy {
    pub fn permits(&self, user_id: &str) -> bool {
        match self {
            SecurityPolicy::Open => true,
            SecurityPolicy::Allowlist(entries) => entries.contains(user_id),
        }
    }
}

pub struct CommandRouter {
    store: Arc<Store>,
    runtime: Arc<AgentRuntime>,
    limiter: RateLimiter,
    security: SecurityPolicy,
}

impl CommandRouter {
    pub fn new(store: Arc<Store>, runtime: Arc<AgentRuntime>) -> Self {
        Self::with_security(store, runtime, SecurityPolicy::default())
    }

    pub fn with_security(store: Arc<Store>, runtime: Arc<AgentRuntime>, security: SecurityPolicy) -> Self {
        Self { store, runtime, limiter: RateLimiter::default_for_commands(), security }
    }

    /// Routes one inbound message and returns the reply text (spec.md
    /// §4.4). The security gate is checked first, then the rate limit,
    /// ahead of any skill or runtime invocation.
    pub async fn handle(&self, channel: Arc<dyn ChannelContext>, chain_ids: Vec<u64>, text: &str) -> String {
        let user_id = channel.user_id().to_string();
        if !self.security.permits(&user_id) {
            return "This server is running in allowlist mode and your account is not authorized.".to_string();
        }
        if !self.limiter.try_acquire(&user_id).await {
            return "You're sending messages too quickly. Please wait a moment and try again.".to_string();
        }

        let preferences = self.store.get_preferences(&user_id).await.unwrap_or_default();
        let wallet_address = None;
        let trimmed = text.trim();

        if let Some(rest) = trimmed.strip_prefix("/wallet") {
            return self.wallet(rest.trim()).await;
        }

        match trimmed.split_whitespace().next().unwrap_or("") {
            "/start" => self.start(wallet_address.as_deref()),
            "/help" => self.help().await,
            "/balance" => {
                let ctx = SkillContext {
                    user_id: user_id.clone(),
                    wallet_address,
                    chain_ids,
                    preferences,
                    channel: channel.clone(),
                };
                self.runtime.run_skill_directly("balance", serde_json::json!({}), &ctx).await
            }
            "/clear" => self.clear(&user_id).await,
            _ => {
                self.runtime
                    .run_turn(channel, wallet_address, chain_ids, preferences, trimmed)
                    .await
            }
        }
    }

    fn start(&self, wallet_address: Option<&str>) -> String {
        match wallet_address {
            Some(addr) => format!("Welcome back. Your wallet {addr} is ready — try /balance or just ask me what to do."),
            None => "Welcome. No wallet is configured yet.\n\nSetup Guide:\n1. Create a wallet with /wallet create\n2. Fund it, then try /balance or just ask me what to do."
                .to_string(),
        }
    }

    async fn help(&self) -> String {
        let skills = self.runtime.list_skills().await;
        if skills.is_empty() {
            return "No skills are registered yet.".to_string();
        }
        let mut lines = vec!["Available commands: /start, /help, /wallet, /balance, /clear".to_string()];
        lines.push("Skills:".to_string());
        for skill in skills {
            lines.push(format!("- {}: {}", skill.0, skill.1));
        }
        lines.join("\n")
    }

    async fn wallet(&self, rest: &str) -> String {
        match rest.split_whitespace().next().unwrap_or("") {
            "" | "list" | "default" => {
                "Wallet management is handled by an external key-management collaborator not wired into this build.".to_string()
            }
            "create" | "import" => {
                "Wallet creation/import is handled by an external key-management collaborator not wired into this build.".to_string()
            }
            other => format!("wallet: unknown sub-command '{other}'"),
        }
    }

    async fn clear(&self, user_id: &str) -> String {
        match self.store.clear_history(user_id).await {
            Ok(()) => "Conversation history cleared.".to_string(),
            Err(err) => format!("Could not clear history: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent_parser::IntentParser;
    use async_trait::async_trait;
    use chainclaw_providers::{ChatMessage, ChatResponse, LlmProvider, ToolSchema};
    use chainclaw_skills::SkillRegistry;

    struct SilentChannel(&'static str);
    #[async_trait]
    impl ChannelContext for SilentChannel {
        fn user_id(&self) -> &str {
            self.0
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

    struct StubProvider;
    #[async_trait]
    impl LlmProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }
        async fn chat(&self, _messages: &[ChatMessage], _tools: Option<&[ToolSchema]>) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse { content: "hi".to_string(), tool_calls: vec![], usage: None })
        }
    }

    async fn router() -> CommandRouter {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let skills = SkillRegistry::new();
        let parser = IntentParser::new(Arc::new(StubProvider));
        let runtime = Arc::new(AgentRuntime::new(store.clone(), parser, skills));
        CommandRouter::new(store, runtime)
    }

    #[tokio::test]
    async fn start_without_wallet_mentions_setup() {
        let router = router().await;
        let reply = router.handle(Arc::new(SilentChannel("u1")), vec![1], "/start").await;
        assert!(reply.contains("Setup Guide"));
        assert!(reply.contains("Create a wallet"));
    }

    #[tokio::test]
    async fn clear_empties_history() {
        let router = router().await;
        router.handle(Arc::new(SilentChannel("u1")), vec![1], "hello there").await;
        let reply = router.handle(Arc::new(SilentChannel("u1")), vec![1], "/clear").await;
        assert_eq!(reply, "Conversation history cleared.");
    }

    #[tokio::test]
    async fn wallet_subcommand_reports_external_collaborator() {
        let router = router().await;
        let reply = router.handle(Arc::new(SilentChannel("u1")), vec![1], "/wallet create").await;
        assert!(reply.contains("external key-management"));
    }

    #[tokio::test]
    async fn allowlist_mode_rejects_unlisted_user() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let skills = SkillRegistry::new();
        let parser = IntentParser::new(Arc::new(StubProvider));
        let runtime = Arc::new(AgentRuntime::new(store.clone(), parser, skills));
        let allowed = std::collections::HashSet::from(["u2".to_string()]);
        let router = CommandRouter::with_security(store, runtime, SecurityPolicy::Allowlist(allowed));
        let reply = router.handle(Arc::new(SilentChannel("u1")), vec![1], "/help").await;
        assert!(reply.contains("not authorized"));
    }

    #[tokio::test]
    async fn rate_limit_blocks_after_capacity_exhausted() {
        let router = router().await;
        for _ in 0..20 {
            router.handle(Arc::new(SilentChannel("u1")), vec![1], "/help").await;
        }
        let reply = router.handle(Arc::new(SilentChannel("u1")), vec![1], "/help").await;
        assert!(reply.contains("too quickly"));
    }
}
