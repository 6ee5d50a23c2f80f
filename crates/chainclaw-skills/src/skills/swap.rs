//! `swap` skill (spec.md §4.1): resolves a quote from a DEX aggregator and
//! either broadcasts it through the Transaction Pipeline or, with no signing
//! credentials configured, returns the quote alone.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_pipeline::TransactionPipeline;
use chainclaw_pipeline::TxRequest;
use chainclaw_providers::{DexAggregator, Signer};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

use super::chain_action::execute_or_quote;

pub struct SwapSkill {
    aggregator: Arc<dyn DexAggregator>,
    signer: Arc<dyn Signer>,
    pipeline: Arc<TransactionPipeline>,
}

impl SwapSkill {
    pub fn new(aggregator: Arc<dyn DexAggregator>, signer: Arc<dyn Signer>, pipeline: Arc<TransactionPipeline>) -> Self {
        Self { aggregator, signer, pipeline }
    }
}

#[async_trait]
impl Skill for SwapSkill {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn description(&self) -> &'static str {
        "Quotes and executes a token swap on the user's default chain."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chain_id": {"type": "integer"},
                "from_token": {"type": "string"},
                "to_token": {"type": "string"},
                "amount": {"type": "string"}
            },
            "required": ["from_token", "to_token", "amount"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(from_token) = params.get("from_token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("from_token: must be a string");
        };
        let Some(to_token) = params.get("to_token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("to_token: must be a string");
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

        let quote = match self.aggregator.quote_swap(chain_id, from_token, to_token, amount).await {
            Ok(q) => q,
            Err(err) => return SkillResult::fail(format!("could not get a swap quote: {err}")),
        };

        let req = TxRequest {
            chain_id,
            user_id: ctx.user_id.clone(),
            from: wallet_address.clone(),
            to: quote.to_address.clone(),
            value: "0".to_string(),
            value_usd: quote.value_usd,
            calldata: quote.calldata.clone(),
            skill_name: "swap".to_string(),
            intent_description: format!("swap {amount} {from_token} for {to_token}"),
            is_buy: true,
            buy_token: Some(to_token.to_string()),
            buy_amount: Some(quote.amount_out.clone()),
            strategy: None,
        };
        let quote_json = serde_json::to_value(&quote).unwrap_or(json!({}));
        execute_or_quote(&self.signer, &self.pipeline, quote_json, req, ctx).await
    }
}
