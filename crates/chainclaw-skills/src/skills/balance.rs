//! `balance` skill (spec.md §4.1): read-only aggregation across `chainIds`,
//! with an optional chain filter. Fails with a configuration error when no
//! wallet is set.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_providers::WalletBalanceApi;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct BalanceSkill {
    wallet: Arc<dyn WalletBalanceApi>,
}

impl BalanceSkill {
    pub fn new(wallet: Arc<dyn WalletBalanceApi>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Skill for BalanceSkill {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn description(&self) -> &'static str {
        "Reports wallet token balances across one or more chains."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chain_id": {"type": "integer", "description": "Restrict the report to a single chain id."}
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(wallet_address) = &ctx.wallet_address else {
            return SkillResult::fail("no wallet is configured for this user");
        };
        let chain_filter = params.get("chain_id").and_then(|v| v.as_u64());
        let chain_ids: Vec<u64> = match chain_filter {
            Some(id) => vec![id],
            None => ctx.chain_ids.clone(),
        };
        if chain_ids.is_empty() {
            return SkillResult::fail("no chain ids are configured for this user");
        }

        let mut per_chain = serde_json::Map::new();
        let mut lines = Vec::new();
        for chain_id in &chain_ids {
            match self.wallet.balances(*chain_id, wallet_address).await {
                Ok(balances) => {
                    for balance in &balances {
                        lines.push(format!("chain {chain_id}: {} {}", balance.amount, balance.token));
                    }
                    per_chain.insert(chain_id.to_string(), serde_json::to_value(&balances).unwrap_or(json!([])));
                }
                Err(err) => {
                    tracing::warn!(chain_id, error = %err, "balance lookup failed for chain");
                    per_chain.insert(chain_id.to_string(), json!({"error": err.to_string()}));
                }
            }
        }

        let message = if lines.is_empty() {
            format!("no balances found across {} chain(s)", chain_ids.len())
        } else {
            lines.join("\n")
        };
        SkillResult::ok_with_data(message, Value::Object(per_chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainclaw_providers::TokenBalance;
    use chainclaw_types::channel::ChannelContext;

    struct NoopChannel;
    #[async_trait]
    impl ChannelContext for NoopChannel {
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

    struct OneEthWallet;
    #[async_trait]
    impl WalletBalanceApi for OneEthWallet {
        async fn balances(&self, _chain_id: u64, _wallet_address: &str) -> anyhow::Result<Vec<TokenBalance>> {
            Ok(vec![TokenBalance { token: "ETH".to_string(), amount: "1".to_string(), usd_value: Some(3000.0) }])
        }
    }

    fn ctx(wallet_address: Option<String>) -> SkillContext {
        SkillContext {
            user_id: "u1".to_string(),
            wallet_address,
            chain_ids: vec![1],
            preferences: Default::default(),
            channel: Arc::new(NoopChannel),
        }
    }

    #[tokio::test]
    async fn reports_eth_balance_in_message() {
        let skill = BalanceSkill::new(Arc::new(OneEthWallet));
        let result = skill.execute(json!({}), &ctx(Some("0xabc".to_string()))).await;
        assert!(result.success);
        assert!(result.message.contains("ETH"));
    }

    #[tokio::test]
    async fn missing_wallet_fails_with_configuration_error() {
        let skill = BalanceSkill::new(Arc::new(OneEthWallet));
        let result = skill.execute(json!({}), &ctx(None)).await;
        assert!(!result.success);
    }
}
