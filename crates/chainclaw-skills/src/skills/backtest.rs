//! `backtest` skill (spec.md §4.1): CRUD-like facade over the Backtest
//! Engine (spec.md §4.10).

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_memory::Store;
use chainclaw_strategy::{run_backtest, BacktestConfig, StrategyRegistry};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use chrono::NaiveDate;
use serde_json::{json, Value};

pub struct BacktestSkill {
    store: Arc<Store>,
    registry: StrategyRegistry,
}

impl BacktestSkill {
    pub fn new(store: Arc<Store>, registry: StrategyRegistry) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl Skill for BacktestSkill {
    fn name(&self) -> &'static str {
        "backtest"
    }

    fn description(&self) -> &'static str {
        "Replays a registered agent strategy against cached historical prices."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {"type": "string"},
                "agent_version": {"type": "string"},
                "start_date": {"type": "string", "format": "date"},
                "end_date": {"type": "string", "format": "date"},
                "starting_capital_usd": {"type": "number", "default": 10000.0},
                "fee_percent": {"type": "number", "default": 0.3},
                "slippage_percent": {"type": "number", "default": 0.5},
                "benchmark_token": {"type": "string"}
            },
            "required": ["agent_name", "start_date", "end_date"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &SkillContext) -> SkillResult {
        let Some(agent_name) = params.get("agent_name").and_then(|v| v.as_str()) else {
            return SkillResult::fail("agent_name: must be a string");
        };
        let agent_version = params.get("agent_version").and_then(|v| v.as_str()).unwrap_or("1.0.0");
        let Some(start_date) = params.get("start_date").and_then(|v| v.as_str()).and_then(parse_date) else {
            return SkillResult::fail("start_date: must be an ISO date (YYYY-MM-DD)");
        };
        let Some(end_date) = params.get("end_date").and_then(|v| v.as_str()).and_then(parse_date) else {
            return SkillResult::fail("end_date: must be an ISO date (YYYY-MM-DD)");
        };

        let Some(strategy) = self.registry.get(agent_name, agent_version).await else {
            return SkillResult::fail(format!("no strategy registered for {agent_name} {agent_version}"));
        };

        let config = BacktestConfig {
            agent_definition: strategy.definition,
            start_date,
            end_date,
            starting_capital_usd: params.get("starting_capital_usd").and_then(|v| v.as_f64()).unwrap_or(10_000.0),
            fee_percent: params.get("fee_percent").and_then(|v| v.as_f64()).unwrap_or(0.3),
            slippage_percent: params.get("slippage_percent").and_then(|v| v.as_f64()).unwrap_or(0.5),
            benchmark_token: params.get("benchmark_token").and_then(|v| v.as_str()).map(str::to_string),
        };

        match run_backtest(&self.store, strategy.evaluate.as_ref(), config).await {
            Ok(result) => SkillResult::ok_with_data(
                format!(
                    "backtest complete: {:.2}% total return over {} trade(s)",
                    result.metrics.total_return_pct,
                    result.trades.len()
                ),
                serde_json::to_value(&result).unwrap_or(json!({})),
            ),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
