//! `marketplace` skill (spec.md §4.1): CRUD-like facade over agent
//! marketplace subscriptions (SPEC_FULL.md §B "Marketplace").

use async_trait::async_trait;
use chainclaw_strategy::Marketplace;
use chainclaw_types::agent::AgentMode;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct MarketplaceSkill {
    marketplace: Marketplace,
}

impl MarketplaceSkill {
    pub fn new(marketplace: Marketplace) -> Self {
        Self { marketplace }
    }
}

#[async_trait]
impl Skill for MarketplaceSkill {
    fn name(&self) -> &'static str {
        "marketplace"
    }

    fn description(&self) -> &'static str {
        "Subscribes to, lists, or unsubscribes from marketplace trading agents."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["subscribe", "list", "unsubscribe"]},
                "agent_name": {"type": "string"},
                "agent_version": {"type": "string"},
                "mode": {"type": "string", "enum": ["dry_run", "live"]},
                "config_options": {"type": "object"},
                "subscription_id": {"type": "string"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let action = params.get("action").and_then(|v| v.as_str()).unwrap_or("list");
        match action {
            "subscribe" => self.subscribe(&params, ctx).await,
            "list" => self.list(ctx).await,
            "unsubscribe" => self.unsubscribe(&params, ctx).await,
            other => SkillResult::fail(format!("action: unknown action '{other}'")),
        }
    }
}

impl MarketplaceSkill {
    async fn subscribe(&self, params: &Value, ctx: &SkillContext) -> SkillResult {
        let Some(agent_name) = params.get("agent_name").and_then(|v| v.as_str()) else {
            return SkillResult::fail("agent_name: must be a string");
        };
        let agent_version = params.get("agent_version").and_then(|v| v.as_str()).unwrap_or("1.0.0");
        let mode = match params.get("mode").and_then(|v| v.as_str()) {
            Some("live") => AgentMode::Live,
            _ => AgentMode::DryRun,
        };
        let config_options = params.get("config_options").cloned().unwrap_or(json!({}));
        match self.marketplace.subscribe(&ctx.user_id, agent_name, agent_version, mode, config_options).await {
            Ok(sub) => SkillResult::ok_with_data(format!("subscribed to {agent_name}"), serde_json::to_value(&sub).unwrap_or(json!({}))),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    async fn list(&self, ctx: &SkillContext) -> SkillResult {
        match self.marketplace.list(&ctx.user_id).await {
            Ok(subs) if subs.is_empty() => SkillResult::ok("no marketplace subscriptions"),
            Ok(subs) => SkillResult::ok_with_data(format!("{} subscription(s)", subs.len()), serde_json::to_value(&subs).unwrap_or(json!([]))),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    async fn unsubscribe(&self, params: &Value, ctx: &SkillContext) -> SkillResult {
        let Some(subscription_id) = params.get("subscription_id").and_then(|v| v.as_str()) else {
            return SkillResult::fail("subscription_id: must be a string");
        };
        let Some(agent_name) = params.get("agent_name").and_then(|v| v.as_str()) else {
            return SkillResult::fail("agent_name: must be a string");
        };
        match self.marketplace.unsubscribe(subscription_id, &ctx.user_id, agent_name).await {
            Ok(()) => SkillResult::ok(format!("unsubscribed from {agent_name}")),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }
}
