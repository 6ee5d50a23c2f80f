//! `lend` skill (spec.md §4.1): resolves a quote from a lending-pool
//! boundary and either broadcasts it or returns a quote-only result.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_pipeline::TransactionPipeline;
use chainclaw_pipeline::TxRequest;
use chainclaw_providers::{LendingPoolApi, Signer};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

use super::chain_action::execute_or_quote;

pub struct LendSkill {
    pool: Arc<dyn LendingPoolApi>,
    signer: Arc<dyn Signer>,
    pipeline: Arc<TransactionPipeline>,
}

impl LendSkill {
    pub fn new(pool: Arc<dyn LendingPoolApi>, signer: Arc<dyn Signer>, pipeline: Arc<TransactionPipeline>) -> Self {
        Self { pool, signer, pipeline }
    }
}

#[async_trait]
impl Skill for LendSkill {
    fn name(&self) -> &'static str {
        "lend"
    }

    fn description(&self) -> &'static str {
        "Quotes and executes a lending-pool deposit."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chain_id": {"type": "integer"},
                "token": {"type": "string"},
                "amount": {"type": "string"}
            },
            "required": ["token", "amount"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(token) = params.get("token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("token: must be a string");
        };
        let Some(amount) = params.get("amount").and_then(|v| v.as_str()) else {
            return SkillResult::fail("amount: must be a string");
        };
        let Some(wallet_address) = &ctx.wallet_address else {
            return SkillResult::fail("no wallet is configured for this user");
        };
        let chain_id = params
            .get("chain_id")
            .and_then(|v| v.as_u64())
            .or_else(|| ctx.chain_ids.first().copied())
            .unwrap_or(ctx.preferences.default_chain_id);

        let quote = match self.pool.quote_lend(chain_id, token, amount).await {
            Ok(q) => q,
            Err(err) => return SkillResult::fail(format!("could not get a lending quote: {err}")),
        };

        let req = TxRequest {
            chain_id,
            user_id: ctx.user_id.clone(),
            from: wallet_address.clone(),
            to: quote.to_address.clone(),
            value: "0".to_string(),
            value_usd: quote.value_usd,
            calldata: quote.calldata.clone(),
            skill_name: "lend".to_string(),
            intent_description: format!("lend {amount} {token} into {}", quote.pool),
            is_buy: false,
            buy_token: None,
            buy_amount: None,
            strategy: None,
        };
        let quote_json = serde_json::to_value(&quote).unwrap_or(json!({}));
        execute_or_quote(&self.signer, &self.pipeline, quote_json, req, ctx).await
    }
}
