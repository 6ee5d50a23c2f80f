//! `alert` skill (spec.md §4.1): CRUD-like facade over price alerts
//! (spec.md §4.6).

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_memory::Store;
use chainclaw_types::alert::AlertType;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct AlertSkill {
    store: Arc<Store>,
}

impl AlertSkill {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Skill for AlertSkill {
    fn name(&self) -> &'static str {
        "alert"
    }

    fn description(&self) -> &'static str {
        "Creates or lists one-shot price alerts."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "list"]},
                "type": {"type": "string", "enum": ["price_above", "price_below"]},
                "token": {"type": "string"},
                "threshold": {"type": "number"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let action = params.get("action").and_then(|v| v.as_str()).unwrap_or("list");
        match action {
            "create" => self.create(&params, ctx).await,
            "list" => self.list(ctx).await,
            other => SkillResult::fail(format!("action: unknown action '{other}'")),
        }
    }
}

impl AlertSkill {
    async fn create(&self, params: &Value, ctx: &SkillContext) -> SkillResult {
        let alert_type = match params.get("type").and_then(|v| v.as_str()) {
            Some("price_above") => AlertType::PriceAbove,
            Some("price_below") => AlertType::PriceBelow,
            Some(other) => return SkillResult::fail(format!("type: unknown alert type '{other}'")),
            None => return SkillResult::fail("type: must be 'price_above' or 'price_below'"),
        };
        let Some(token) = params.get("token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("token: must be a string");
        };
        let Some(threshold) = params.get("threshold").and_then(|v| v.as_f64()) else {
            return SkillResult::fail("threshold: must be a number");
        };
        match self.store.create_alert(&ctx.user_id, alert_type, token, threshold).await {
            Ok(alert) => SkillResult::ok_with_data(format!("created alert {}", alert.id), serde_json::to_value(&alert).unwrap_or(json!({}))),
            Err(err) => SkillResult::fail(format!("could not create alert: {err}")),
        }
    }

    async fn list(&self, ctx: &SkillContext) -> SkillResult {
        match self.store.list_user_alerts(&ctx.user_id).await {
            Ok(alerts) if alerts.is_empty() => SkillResult::ok("no alerts"),
            Ok(alerts) => SkillResult::ok_with_data(format!("{} alert(s)", alerts.len()), serde_json::to_value(&alerts).unwrap_or(json!([]))),
            Err(err) => SkillResult::fail(format!("could not list alerts: {err}")),
        }
    }
}
