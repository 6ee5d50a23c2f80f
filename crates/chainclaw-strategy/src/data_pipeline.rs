//! Data Pipeline (SPEC_FULL.md §B): labels agent trades with their
//! forward-looking outcome over fixed windows, and flattens labelled
//! reasoning traces into training rows for downstream strategy research.

use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_providers::PriceOracle;
use chainclaw_types::agent::{AgentTrade, OutcomeLabel, OutcomeWindow};
use chrono::{Duration, Utc};
use serde_json::json;

const WINDOWS: [(OutcomeWindow, i64); 3] =
    [(OutcomeWindow::OneHour, 1), (OutcomeWindow::TwentyFourHours, 24), (OutcomeWindow::SevenDays, 24 * 7)];

/// Labels every filled trade for an agent whose outcome window has elapsed
/// and has not already been labelled, using the current price as a proxy
/// for "price at window end" (no intra-day historical tick cache exists;
/// daily historical prices back the Backtest Engine, not this live path).
pub async fn label_due_outcomes(store: &Arc<Store>, prices: &Arc<PriceOracle>, agent_id: &str) -> anyhow::Result<usize> {
    let trades = store.list_agent_trades(agent_id).await?;
    let existing = store.list_outcome_labels_for_agent(agent_id).await?;
    let now = Utc::now();
    let mut labeled = 0;
    for trade in trades.iter().filter(|t| t.status == chainclaw_types::agent::TradeStatus::Filled) {
        for (window, hours) in WINDOWS {
            let due_at = trade.created_at + Duration::hours(hours);
            if now < due_at {
                continue;
            }
            if existing.iter().any(|l| l.trade_id == trade.id && l.window == window) {
                continue;
            }
            let Some(price_at_window) = prices.get_token_price(&trade.token).await? else { continue };
            store.record_outcome_label(&outcome_label(trade, window, price_at_window)).await?;
            labeled += 1;
        }
    }
    Ok(labeled)
}

fn outcome_label(trade: &AgentTrade, window: OutcomeWindow, price_at_window: f64) -> OutcomeLabel {
    let direction = if trade.action == "sell" { -1.0 } else { 1.0 };
    let pnl_percent = direction * (price_at_window - trade.execution_price) / trade.execution_price.max(0.0001) * 100.0;
    let pnl_usd = trade.amount_usd * pnl_percent / 100.0;
    OutcomeLabel {
        trade_id: trade.id.clone(),
        agent_id: trade.agent_id.clone(),
        token: trade.token.clone(),
        action: trade.action.clone(),
        price_at_execution: trade.execution_price,
        window,
        price_at_window,
        pnl_usd,
        pnl_percent,
        labeled_at: Utc::now(),
    }
}

/// Flattens every labelled reasoning trace (matched to its agent's trades
/// by timestamp proximity) into a training row and persists it, returning
/// the count newly written. Idempotent re-runs will duplicate rows since
/// `enriched_reasoning` has no uniqueness constraint on its own; callers
/// that run this periodically should track the last processed trace id.
pub async fn extract_training_rows(store: &Arc<Store>, agent_id: &str) -> anyhow::Result<usize> {
    let traces = store.list_reasoning_traces(agent_id).await?;
    let labels = store.list_outcome_labels_for_agent(agent_id).await?;
    let mut written = 0;
    for trace in traces {
        let matching_labels: Vec<&OutcomeLabel> = labels
            .iter()
            .filter(|l| (l.labeled_at - trace.timestamp).num_hours().abs() <= 24 * 8)
            .collect();
        if matching_labels.is_empty() {
            continue;
        }
        let row = json!({
            "reasoning_trace_id": trace.id,
            "context": trace.context,
            "decisions": trace.decisions,
            "reasoning": trace.reasoning,
            "outcomes": matching_labels,
        });
        store.record_enriched_reasoning(trace.id, None, &row).await?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainclaw_providers::PriceFeed;
    use chainclaw_types::agent::{AgentMode, TradeStatus};
    use uuid::Uuid;

    struct FixedFeed(f64);
    #[async_trait]
    impl PriceFeed for FixedFeed {
        async fn fetch_price(&self, _symbol: &str) -> anyhow::Result<Option<f64>> {
            Ok(Some(self.0))
        }
    }

    #[tokio::test]
    async fn due_trade_gets_labelled_once() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let prices = Arc::new(PriceOracle::new(Arc::new(FixedFeed(2200.0))));
        let trade = AgentTrade {
            id: Uuid::new_v4().to_string(),
            agent_id: "a1".to_string(),
            user_id: "u1".to_string(),
            mode: AgentMode::DryRun,
            token: "ETH".to_string(),
            action: "buy".to_string(),
            amount_usd: 100.0,
            execution_price: 2000.0,
            status: TradeStatus::Filled,
            tx_id: None,
            created_at: Utc::now() - Duration::hours(2),
        };
        store.record_agent_trade(&trade).await.unwrap();
        let labeled = label_due_outcomes(&store, &prices, "a1").await.unwrap();
        assert_eq!(labeled, 1); // only the 1h window is due
        let labels = store.list_outcome_labels_for_agent("a1").await.unwrap();
        assert_eq!(labels.len(), 1);
        assert!(labels[0].pnl_percent > 0.0);

        let labeled_again = label_due_outcomes(&store, &prices, "a1").await.unwrap();
        assert_eq!(labeled_again, 0);
    }

    #[tokio::test]
    async fn pending_trade_is_never_labelled() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let prices = Arc::new(PriceOracle::new(Arc::new(FixedFeed(2200.0))));
        let trade = AgentTrade {
            id: Uuid::new_v4().to_string(),
            agent_id: "a1".to_string(),
            user_id: "u1".to_string(),
            mode: AgentMode::Live,
            token: "ETH".to_string(),
            action: "buy".to_string(),
            amount_usd: 100.0,
            execution_price: 2000.0,
            status: TradeStatus::Pending,
            tx_id: None,
            created_at: Utc::now() - Duration::days(10),
        };
        store.record_agent_trade(&trade).await.unwrap();
        assert_eq!(label_due_outcomes(&store, &prices, "a1").await.unwrap(), 0);
    }
}
