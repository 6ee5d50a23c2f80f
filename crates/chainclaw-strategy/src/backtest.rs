//! Backtest Engine (spec.md §4.10): deterministic historical replay using
//! the same `strategy.evaluate` function as the live Agent Runner.

use std::collections::HashMap;
use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_types::agent::{AgentDefinition, AgentTrade, Decision, PerformanceMetrics, TradeStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{EvaluateFn, EvaluationContext};
use crate::performance::{compute_metrics, EquityPoint, TradeReturn};

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub agent_definition: AgentDefinition,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_capital_usd: f64,
    pub fee_percent: f64,
    pub slippage_percent: f64,
    pub benchmark_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: PerformanceMetrics,
    pub trades: Vec<AgentTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Replays `config` day-by-day against the cached historical price series
/// (spec.md §4.10 steps 1-5). Returns an error if the watchlist has no
/// cached price history at all across the window, since a backtest over an
/// empty series would silently report a flat 0% return.
pub async fn run_backtest(
    store: &Arc<Store>,
    evaluate: &EvaluateFn,
    config: BacktestConfig,
) -> anyhow::Result<BacktestResult> {
    let started_at = Utc::now();

    // Step 1: a time-indexed price series per watchlist token.
    let mut series_by_token: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
    for token in &config.agent_definition.strategy.watchlist {
        let series = store.historical_price_series(token, config.start_date, config.end_date).await?;
        series_by_token.insert(token.clone(), series.into_iter().map(|p| (p.day, p.price_usd)).collect());
    }
    let all_days: Vec<NaiveDate> = {
        let mut days: Vec<NaiveDate> =
            series_by_token.values().flat_map(|s| s.iter().map(|(d, _)| *d)).collect();
        days.sort();
        days.dedup();
        days
    };
    if all_days.is_empty() {
        anyhow::bail!("no historical price data cached for the watchlist in the requested window");
    }

    // Step 2: initialise capital and an empty portfolio.
    let mut cash_usd = config.starting_capital_usd;
    let mut holdings: HashMap<String, f64> = HashMap::new();
    let mut equity_curve = Vec::with_capacity(all_days.len());
    let mut trades = Vec::new();
    let mut trade_returns = Vec::new();
    let mut recent_trades: Vec<AgentTrade> = Vec::new();

    for day in &all_days {
        let mut prices = HashMap::new();
        for (token, series) in &series_by_token {
            if let Some((_, price)) = series.iter().rev().find(|(d, _)| d <= day) {
                prices.insert(token.clone(), *price);
            }
        }
        let timestamp = DateTime::<Utc>::from_naive_utc_and_offset(day.and_hms_opt(0, 0, 0).unwrap(), Utc);
        let ctx = EvaluationContext {
            now: timestamp,
            prices: prices.clone(),
            portfolio: Vec::new(),
            recent_trades: recent_trades.clone(),
            knowledge: HashMap::new(),
        };

        // Step 3: for each decision, apply slippage and fee deductions.
        for decision in evaluate(&ctx) {
            let Some(price) = prices.get(&decision.token).copied() else { continue };
            if decision.amount_usd > cash_usd && decision.action == "buy" {
                continue;
            }
            let (filled_usd, execution_price, entry) = apply_decision(
                &decision,
                price,
                config.fee_percent,
                config.slippage_percent,
                &config.agent_definition.name,
                timestamp,
            );
            match decision.action.as_str() {
                "buy" => {
                    cash_usd -= filled_usd;
                    *holdings.entry(decision.token.clone()).or_insert(0.0) += filled_usd / execution_price;
                }
                "sell" => {
                    let held = holdings.entry(decision.token.clone()).or_insert(0.0);
                    let sell_usd = filled_usd.min(*held * execution_price);
                    *held -= sell_usd / execution_price;
                    cash_usd += sell_usd;
                    let return_pct = (sell_usd - filled_usd) / filled_usd.max(0.0001) * 100.0;
                    trade_returns.push(TradeReturn { return_pct });
                }
                _ => continue,
            }
            trades.push(entry.clone());
            recent_trades.push(entry);
        }

        let holdings_value: f64 = holdings.iter().map(|(token, qty)| qty * prices.get(token).copied().unwrap_or(0.0)).sum();
        equity_curve.push(EquityPoint { timestamp, equity_usd: cash_usd + holdings_value });
    }

    let benchmark_return_pct = match &config.benchmark_token {
        Some(token) => {
            let series = store.historical_price_series(token, config.start_date, config.end_date).await?;
            match (series.first(), series.last()) {
                (Some(first), Some(last)) if first.price_usd > 0.0 => {
                    Some((last.price_usd - first.price_usd) / first.price_usd * 100.0)
                }
                _ => None,
            }
        }
        None => None,
    };

    let metrics = compute_metrics(&equity_curve, &trade_returns, benchmark_return_pct);
    let completed_at = Utc::now();
    Ok(BacktestResult {
        metrics,
        trades,
        equity_curve,
        started_at,
        completed_at,
        duration_ms: (completed_at - started_at).num_milliseconds(),
    })
}

fn apply_decision(
    decision: &Decision,
    price: f64,
    fee_percent: f64,
    slippage_percent: f64,
    agent_name: &str,
    timestamp: DateTime<Utc>,
) -> (f64, f64, AgentTrade) {
    let slip_multiplier = if decision.action == "buy" { 1.0 + slippage_percent / 100.0 } else { 1.0 - slippage_percent / 100.0 };
    let execution_price = price * slip_multiplier;
    let filled_usd = decision.amount_usd * (1.0 - fee_percent / 100.0);
    let trade = AgentTrade {
        id: Uuid::new_v4().to_string(),
        agent_id: agent_name.to_string(),
        user_id: "backtest".to_string(),
        mode: chainclaw_types::agent::AgentMode::DryRun,
        token: decision.token.clone(),
        action: decision.action.clone(),
        amount_usd: filled_usd,
        execution_price,
        status: TradeStatus::Filled,
        tx_id: None,
        created_at: timestamp,
    };
    (filled_usd, execution_price, trade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::dip_buyer_evaluate;

    fn buy_once_evaluate() -> Arc<EvaluateFn> {
        Arc::new(|ctx: &EvaluationContext| {
            if ctx.recent_trades.is_empty() {
                vec![Decision {
                    action: "buy".to_string(),
                    token: "ETH".to_string(),
                    amount_usd: 100.0,
                    reasoning: "initial entry".to_string(),
                }]
            } else {
                vec![]
            }
        })
    }

    async fn seeded_store() -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        for (i, price) in [2000.0, 2100.0, 2200.0, 1900.0, 2300.0].into_iter().enumerate() {
            store.cache_historical_price("ETH", base + chrono::Duration::days(i as i64), price).await.unwrap();
        }
        store
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            agent_definition: crate::registry::dip_buyer_definition(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            starting_capital_usd: 1000.0,
            fee_percent: 0.1,
            slippage_percent: 0.5,
            benchmark_token: Some("ETH".to_string()),
        }
    }

    #[tokio::test]
    async fn buy_only_strategy_produces_one_trade_and_a_growing_equity_curve() {
        let store = seeded_store().await;
        let result = run_backtest(&store, buy_once_evaluate().as_ref(), config()).await.unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.equity_curve.len(), 5);
        assert!(result.metrics.benchmark_return_pct.is_some());
    }

    #[tokio::test]
    async fn empty_price_history_errors_instead_of_reporting_a_silent_flat_curve() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let result = run_backtest(&store, dip_buyer_evaluate().as_ref(), config()).await;
        assert!(result.is_err());
    }
}
