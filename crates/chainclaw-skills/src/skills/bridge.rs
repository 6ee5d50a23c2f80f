//! `bridge` skill (spec.md §4.1): resolves a quote from a bridge aggregator
//! and either broadcasts it or returns a quote-only result.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_pipeline::TransactionPipeline;
use chainclaw_pipeline::TxRequest;
use chainclaw_providers::{BridgeAggregator, Signer};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

use super::chain_action::execute_or_quote;

pub struct BridgeSkill {
    aggregator: Arc<dyn BridgeAggregator>,
    signer: Arc<dyn Signer>,
    pipeline: Arc<TransactionPipeline>,
}

impl BridgeSkill {
    pub fn new(aggregator: Arc<dyn BridgeAggregator>, signer: Arc<dyn Signer>, pipeline: Arc<TransactionPipeline>) -> Self {
        Self { aggregator, signer, pipeline }
    }
}

#[async_trait]
impl Skill for BridgeSkill {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn description(&self) -> &'static str {
        "Quotes and executes a cross-chain token bridge."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "from_chain_id": {"type": "integer"},
                "to_chain_id": {"type": "integer"},
                "token": {"type": "string"},
                "amount": {"type": "string"}
            },
            "required": ["from_chain_id", "to_chain_id", "token", "amount"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(from_chain_id) = params.get("from_chain_id").and_then(|v| v.as_u64()) else {
            return SkillResult::fail("from_chain_id: must be an integer");
        };
        let Some(to_chain_id) = params.get("to_chain_id").and_then(|v| v.as_u64()) else {
            return SkillResult::fail("to_chain_id: must be an integer");
        };
        let Some(token) = params.get("token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("token: must be a string");
        };
        let Some(amount) = params.get("amount").and_then(|v| v.as_str()) else {
            return SkillResult::fail("amount: must be a string");
        };
        let Some(wallet_address) = &ctx.wallet_address else {
            return SkillResult::fail("no wallet is configured for this user");
        };

        let quote = match self.aggregator.quote_bridge(from_chain_id, to_chain_id, token, amount).await {
            Ok(q) => q,
            Err(err) => return SkillResult::fail(format!("could not get a bridge quote: {err}")),
        };

        let req = TxRequest {
            chain_id: from_chain_id,
            user_id: ctx.user_id.clone(),
            from: wallet_address.clone(),
            to: quote.to_address.clone(),
            value: "0".to_string(),
            value_usd: quote.value_usd,
            calldata: quote.calldata.clone(),
            skill_name: "bridge".to_string(),
            intent_description: format!("bridge {amount} {token} from chain {from_chain_id} to chain {to_chain_id}"),
            is_buy: false,
            buy_token: None,
            buy_amount: None,
            strategy: None,
        };
        let quote_json = serde_json::to_value(&quote).unwrap_or(json!({}));
        execute_or_quote(&self.signer, &self.pipeline, quote_json, req, ctx).await
    }
}
