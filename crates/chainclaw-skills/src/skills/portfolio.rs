//! `portfolio` skill (spec.md §4.1): balance plus USD-valued totals;
//! continues even if price lookup fails for some tokens.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_providers::{PriceOracle, WalletBalanceApi};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct PortfolioSkill {
    wallet: Arc<dyn WalletBalanceApi>,
    prices: Arc<PriceOracle>,
}

impl PortfolioSkill {
    pub fn new(wallet: Arc<dyn WalletBalanceApi>, prices: Arc<PriceOracle>) -> Self {
        Self { wallet, prices }
    }
}

#[async_trait]
impl Skill for PortfolioSkill {
    fn name(&self) -> &'static str {
        "portfolio"
    }

    fn description(&self) -> &'static str {
        "Reports wallet balances valued in USD across one or more chains, with a grand total."
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(wallet_address) = &ctx.wallet_address else {
            return SkillResult::fail("no wallet is configured for this user");
        };
        if ctx.chain_ids.is_empty() {
            return SkillResult::fail("no chain ids are configured for this user");
        }

        let mut holdings = Vec::new();
        let mut total_usd = 0.0;
        let mut priced = 0usize;
        let mut unpriced = 0usize;

        for chain_id in &ctx.chain_ids {
            let balances = match self.wallet.balances(*chain_id, wallet_address).await {
                Ok(b) => b,
                Err(err) => {
                    tracing::warn!(chain_id, error = %err, "portfolio balance lookup failed for chain");
                    continue;
                }
            };
            for balance in balances {
                let usd_value = match balance.usd_value {
                    Some(v) => Some(v),
                    None => {
                        let amount: f64 = balance.amount.parse().unwrap_or(0.0);
                        match self.prices.get_token_price(&balance.token).await {
                            Ok(Some(price)) => Some(price * amount),
                            Ok(None) | Err(_) => None,
                        }
                    }
                };
                match usd_value {
                    Some(v) => {
                        total_usd += v;
                        priced += 1;
                    }
                    None => unpriced += 1,
                }
                holdings.push(json!({
                    "chain_id": chain_id,
                    "token": balance.token,
                    "amount": balance.amount,
                    "usd_value": usd_value,
                }));
            }
        }

        let message = if unpriced > 0 {
            format!("portfolio total ${total_usd:.2} across {priced} priced token(s); {unpriced} token(s) had no price available")
        } else {
            format!("portfolio total ${total_usd:.2} across {priced} token(s)")
        };
        SkillResult::ok_with_data(message, json!({"total_usd": total_usd, "holdings": holdings}))
    }
}
