//! The evaluation context passed to `strategy.evaluate` (spec.md §4.9
//! step 1, §4.10 step 2). Identical in shape for a live tick and a
//! backtest step so the same `evaluate` function runs unmodified in both
//! (spec.md §4.10: "using the same strategy.evaluate function as live").

use std::collections::HashMap;

use chainclaw_providers::TokenBalance;
use chainclaw_types::agent::{AgentTrade, Decision};
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    /// Current price of each watchlist token.
    pub prices: HashMap<String, f64>,
    pub portfolio: Vec<TokenBalance>,
    pub recent_trades: Vec<AgentTrade>,
    /// Last value of each knowledge source, keyed by source name
    /// (spec.md §4.9 step 1).
    pub knowledge: HashMap<String, Value>,
}

impl EvaluationContext {
    pub fn price_of(&self, token: &str) -> Option<f64> {
        self.prices.get(token).copied()
    }
}

/// The pure evaluation function every strategy implements (spec.md §3
/// "Strategy": `evaluate` is `(context) -> decisions[]`).
pub type EvaluateFn = dyn Fn(&EvaluationContext) -> Vec<Decision> + Send + Sync;
