//! `risk_check` skill (spec.md §4.1): delegates to the Risk Engine.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_pipeline::RiskEngine;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct RiskCheckSkill {
    risk: Arc<RiskEngine>,
}

impl RiskCheckSkill {
    pub fn new(risk: Arc<RiskEngine>) -> Self {
        Self { risk }
    }
}

#[async_trait]
impl Skill for RiskCheckSkill {
    fn name(&self) -> &'static str {
        "risk_check"
    }

    fn description(&self) -> &'static str {
        "Assesses the safety of a token contract and reports its risk category."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chain_id": {"type": "integer"},
                "address": {"type": "string"}
            },
            "required": ["chain_id", "address"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(chain_id) = params.get("chain_id").and_then(|v| v.as_u64()) else {
            return SkillResult::fail("chain_id: must be an integer");
        };
        let Some(address) = params.get("address").and_then(|v| v.as_str()) else {
            return SkillResult::fail("address: must be a string");
        };

        let (report, score) = match self.risk.assess(chain_id, address).await {
            Ok(v) => v,
            Err(err) => return SkillResult::fail(format!("risk assessment failed: {err}")),
        };
        let verdict = match self.risk.should_block(&ctx.user_id, chain_id, address).await {
            Ok(v) => v,
            Err(err) => return SkillResult::fail(format!("risk assessment failed: {err}")),
        };
        let category = RiskEngine::categorize(score);
        let message = if verdict.blocked {
            format!(
                "{address} is {category:?} (score {score}) and would be blocked: {}",
                verdict.reason.unwrap_or_default()
            )
        } else {
            format!("{address} is {category:?} (score {score})")
        };
        SkillResult::ok_with_data(
            message,
            json!({"score": score, "category": category, "blocked": verdict.blocked, "report": report}),
        )
    }
}
