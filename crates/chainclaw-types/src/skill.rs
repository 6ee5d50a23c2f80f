//! Skill execution contract (spec.md §4.1).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::channel::ChannelContext;
use crate::user::Preferences;

/// `ctx` passed to every skill's `execute` (spec.md §4.1).
#[derive(Clone)]
pub struct SkillContext {
    pub user_id: String,
    pub wallet_address: Option<String>,
    pub chain_ids: Vec<u64>,
    pub preferences: Preferences,
    pub channel: Arc<dyn ChannelContext>,
}

impl SkillContext {
    pub async fn send_reply(&self, text: &str) -> anyhow::Result<()> {
        self.channel.send_reply(text).await
    }

    /// `None` when no confirmation callback is wired for this turn.
    pub async fn request_confirmation(&self, prompt: &str) -> Option<bool> {
        self.channel.request_confirmation(prompt).await
    }
}

/// Uniform skill result (spec.md §4.1): never a stack trace, never a type
/// name, always a plain-English message (spec.md §7).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SkillResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SkillResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None }
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}

/// A skill's typed parameter schema must be able to reject malformed input
/// with a precise, per-field error (spec.md §4.1, §7:
/// `"<field>: <reason>"`).
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// The uniform skill interface invoked by the Router, the Agent Runtime,
/// the `workflow` skill, and the Cron Scheduler (spec.md §4.1).
#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// A JSON Schema (or schema-shaped) description of accepted parameters,
    /// exposed to the Intent Parser as a tool signature (spec.md §4.2).
    fn parameter_schema(&self) -> Value;
    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult;
}
