//! Declarative agent definitions paired with their `evaluate` function
//! (spec.md §3 "Agent definition (declarative)"; "Agents are values, not
//! rows; they are instantiated per subscription/run").
//!
//! An [`AgentDefinition`] is plain data and fully serializable; `evaluate`
//! cannot be, so it is registered separately here, keyed by
//! `(name, version)`, and looked up whenever the Agent Runner or Backtest
//! Engine needs to run a tick.

use std::collections::HashMap;
use std::sync::Arc;

use chainclaw_types::agent::{AgentDefinition, Decision, RiskParams, StrategyDef};
use tokio::sync::RwLock;

use crate::context::{EvaluateFn, EvaluationContext};

#[derive(Clone)]
pub struct RegisteredStrategy {
    pub definition: AgentDefinition,
    pub evaluate: Arc<EvaluateFn>,
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Arc<RwLock<HashMap<(String, String), RegisteredStrategy>>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, definition: AgentDefinition, evaluate: Arc<EvaluateFn>) {
        let key = (definition.name.clone(), definition.version.clone());
        self.strategies.write().await.insert(key, RegisteredStrategy { definition, evaluate });
    }

    pub async fn get(&self, name: &str, version: &str) -> Option<RegisteredStrategy> {
        self.strategies.read().await.get(&(name.to_string(), version.to_string())).cloned()
    }

    pub async fn list(&self) -> Vec<AgentDefinition> {
        self.strategies.read().await.values().map(|s| s.definition.clone()).collect()
    }
}

/// Buys a fixed USD amount of every watchlist token trading below its
/// configured dip threshold (`risk_params.max_position_usd` caps the
/// per-decision size); sells nothing. A minimal, fully deterministic
/// built-in so the agent/backtest skills have at least one concrete
/// strategy to run without requiring an operator-authored one.
pub fn dip_buyer_definition() -> AgentDefinition {
    AgentDefinition {
        name: "dip-buyer".to_string(),
        version: "1.0.0".to_string(),
        description: "Buys watchlist tokens that trade below a configured dip threshold.".to_string(),
        author: "chainclaw".to_string(),
        category: "trend".to_string(),
        skills: vec!["swap".to_string()],
        knowledge_sources: vec!["dip_threshold_pct".to_string()],
        risk_params: RiskParams {
            max_position_usd: 250.0,
            max_daily_trades: 5,
            max_daily_exposure_usd: 1000.0,
            blocked_tokens: Vec::new(),
        },
        strategy: StrategyDef { watchlist: vec!["ETH".to_string(), "BTC".to_string()], evaluation_interval_ms: 60_000 },
    }
}

pub fn dip_buyer_evaluate() -> Arc<EvaluateFn> {
    Arc::new(|ctx: &EvaluationContext| -> Vec<Decision> {
        let dip_threshold_pct = ctx
            .knowledge
            .get("dip_threshold_pct")
            .and_then(|v| v.as_f64())
            .unwrap_or(5.0);
        let mut decisions = Vec::new();
        for (token, price) in &ctx.prices {
            let recent_high = ctx
                .recent_trades
                .iter()
                .filter(|t| &t.token == token)
                .map(|t| t.execution_price)
                .fold(*price, f64::max);
            if recent_high <= 0.0 {
                continue;
            }
            let drop_pct = (recent_high - price) / recent_high * 100.0;
            if drop_pct >= dip_threshold_pct {
                decisions.push(Decision {
                    action: "buy".to_string(),
                    token: token.clone(),
                    amount_usd: 100.0,
                    reasoning: format!(
                        "{token} is down {drop_pct:.1}% from its recent high of ${recent_high:.2}, at or beyond the {dip_threshold_pct:.1}% dip threshold"
                    ),
                });
            }
        }
        decisions
    })
}
