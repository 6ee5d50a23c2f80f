//! Agent strategy records: reasoning traces, their enriched training rows,
//! outcome labels, and agent trades (spec.md §3, §4.9; SPEC_FULL.md §B
//! "Data Pipeline").

use chainclaw_types::agent::{AgentMode, AgentTrade, OutcomeLabel, OutcomeWindow, ReasoningTrace, TradeStatus};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    pub async fn record_reasoning_trace(
        &self,
        agent_id: &str,
        context: &Value,
        decisions: &Value,
        reasoning: &str,
    ) -> StoreResult<ReasoningTrace> {
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO reasoning_traces (agent_id, timestamp, context, decisions, reasoning)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                agent_id, now.to_rfc3339(),
                serde_json::to_string(context).map_err(|e| StoreError::Validation(e.to_string()))?,
                serde_json::to_string(decisions).map_err(|e| StoreError::Validation(e.to_string()))?,
                reasoning,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(ReasoningTrace {
            id,
            agent_id: agent_id.to_string(),
            timestamp: now,
            context: context.clone(),
            decisions: decisions.clone(),
            reasoning: reasoning.to_string(),
        })
    }

    pub async fn list_reasoning_traces(&self, agent_id: &str) -> StoreResult<Vec<ReasoningTrace>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, timestamp, context, decisions, reasoning
             FROM reasoning_traces WHERE agent_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![agent_id], |row| {
                let timestamp: String = row.get(2)?;
                let context_raw: String = row.get(3)?;
                let decisions_raw: String = row.get(4)?;
                let conv = |col: usize, e: serde_json::Error| {
                    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
                };
                Ok(ReasoningTrace {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    context: serde_json::from_str(&context_raw).map_err(|e| conv(3, e))?,
                    decisions: serde_json::from_str(&decisions_raw).map_err(|e| conv(4, e))?,
                    reasoning: row.get(5)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// A flattened `(reasoning_trace, outcome_label)` training row
    /// (SPEC_FULL.md §B "Data Pipeline" — `extract_training_rows`).
    pub async fn record_enriched_reasoning(
        &self,
        reasoning_trace_id: i64,
        trade_id: Option<&str>,
        row: &Value,
    ) -> StoreResult<i64> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO enriched_reasoning (reasoning_trace_id, trade_id, row_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reasoning_trace_id, trade_id,
                serde_json::to_string(row).map_err(|e| StoreError::Validation(e.to_string()))?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn list_enriched_reasoning_rows(&self) -> StoreResult<Vec<Value>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare("SELECT row_json FROM enriched_reasoning ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|raw| serde_json::from_str(&raw).map_err(|e| StoreError::Validation(e.to_string())))
            .collect()
    }

    /// Unique per `(trade_id, window)` (spec.md §3 invariant).
    pub async fn record_outcome_label(&self, label: &OutcomeLabel) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO outcome_labels (trade_id, agent_id, token, action, price_at_execution,
                window, price_at_window, pnl_usd, pnl_percent, labeled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(trade_id, window) DO UPDATE SET
                price_at_window = excluded.price_at_window,
                pnl_usd = excluded.pnl_usd,
                pnl_percent = excluded.pnl_percent,
                labeled_at = excluded.labeled_at",
            params![
                label.trade_id, label.agent_id, label.token, label.action, label.price_at_execution,
                window_str(label.window), label.price_at_window, label.pnl_usd, label.pnl_percent,
                label.labeled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_outcome_labels_for_agent(&self, agent_id: &str) -> StoreResult<Vec<OutcomeLabel>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT trade_id, agent_id, token, action, price_at_execution, window, price_at_window,
                pnl_usd, pnl_percent, labeled_at FROM outcome_labels WHERE agent_id = ?1",
        )?;
        let rows = stmt.query_map(params![agent_id], row_to_label)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn record_agent_trade(&self, trade: &AgentTrade) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO agent_trades (id, agent_id, user_id, mode, token, action, amount_usd,
                execution_price, status, tx_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                trade.id, trade.agent_id, trade.user_id, mode_str(trade.mode), trade.token, trade.action,
                trade.amount_usd, trade.execution_price, trade_status_str(trade.status), trade.tx_id,
                trade.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_agent_trades(&self, agent_id: &str) -> StoreResult<Vec<AgentTrade>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, user_id, mode, token, action, amount_usd, execution_price, status,
                tx_id, created_at FROM agent_trades WHERE agent_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![agent_id], row_to_trade)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub async fn list_user_agent_trades(&self, user_id: &str) -> StoreResult<Vec<AgentTrade>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, user_id, mode, token, action, amount_usd, execution_price, status,
                tx_id, created_at FROM agent_trades WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_trade)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

fn window_str(w: OutcomeWindow) -> &'static str {
    match w {
        OutcomeWindow::OneHour => "1h",
        OutcomeWindow::TwentyFourHours => "24h",
        OutcomeWindow::SevenDays => "7d",
    }
}

fn parse_window(s: &str) -> OutcomeWindow {
    match s {
        "24h" => OutcomeWindow::TwentyFourHours,
        "7d" => OutcomeWindow::SevenDays,
        _ => OutcomeWindow::OneHour,
    }
}

fn mode_str(m: AgentMode) -> &'static str {
    match m {
        AgentMode::DryRun => "dry_run",
        AgentMode::Live => "live",
    }
}

fn parse_mode(s: &str) -> AgentMode {
    match s {
        "live" => AgentMode::Live,
        _ => AgentMode::DryRun,
    }
}

fn trade_status_str(s: TradeStatus) -> &'static str {
    match s {
        TradeStatus::Pending => "pending",
        TradeStatus::Filled => "filled",
        TradeStatus::Failed => "failed",
    }
}

fn parse_trade_status(s: &str) -> TradeStatus {
    match s {
        "filled" => TradeStatus::Filled,
        "failed" => TradeStatus::Failed,
        _ => TradeStatus::Pending,
    }
}

fn row_to_label(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutcomeLabel> {
    let labeled_at: String = row.get(9)?;
    Ok(OutcomeLabel {
        trade_id: row.get(0)?,
        agent_id: row.get(1)?,
        token: row.get(2)?,
        action: row.get(3)?,
        price_at_execution: row.get(4)?,
        window: parse_window(&row.get::<_, String>(5)?),
        price_at_window: row.get(6)?,
        pnl_usd: row.get(7)?,
        pnl_percent: row.get(8)?,
        labeled_at: DateTime::parse_from_rfc3339(&labeled_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_trade(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentTrade> {
    let created_at: String = row.get(10)?;
    Ok(AgentTrade {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        user_id: row.get(2)?,
        mode: parse_mode(&row.get::<_, String>(3)?),
        token: row.get(4)?,
        action: row.get(5)?,
        amount_usd: row.get(6)?,
        execution_price: row.get(7)?,
        status: parse_trade_status(&row.get::<_, String>(8)?),
        tx_id: row.get(9)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reasoning_trace_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .record_reasoning_trace("agent-1", &serde_json::json!({"price": 2000}), &serde_json::json!([]), "hold")
            .await
            .unwrap();
        let traces = store.list_reasoning_traces("agent-1").await.unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].reasoning, "hold");
    }

    #[tokio::test]
    async fn outcome_label_upsert_is_unique_per_trade_and_window() {
        let store = Store::open_in_memory().await.unwrap();
        let label = OutcomeLabel {
            trade_id: "t1".into(),
            agent_id: "a1".into(),
            token: "ETH".into(),
            action: "buy".into(),
            price_at_execution: 2000.0,
            window: OutcomeWindow::OneHour,
            price_at_window: 2100.0,
            pnl_usd: 100.0,
            pnl_percent: 5.0,
            labeled_at: Utc::now(),
        };
        store.record_outcome_label(&label).await.unwrap();
        let mut updated = label.clone();
        updated.pnl_usd = 150.0;
        store.record_outcome_label(&updated).await.unwrap();
        let labels = store.list_outcome_labels_for_agent("a1").await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].pnl_usd, 150.0);
    }

    #[tokio::test]
    async fn agent_trade_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let trade = AgentTrade {
            id: Uuid::new_v4().to_string(),
            agent_id: "a1".into(),
            user_id: "u1".into(),
            mode: AgentMode::DryRun,
            token: "ETH".into(),
            action: "buy".into(),
            amount_usd: 500.0,
            execution_price: 2000.0,
            status: TradeStatus::Filled,
            tx_id: None,
            created_at: Utc::now(),
        };
        store.record_agent_trade(&trade).await.unwrap();
        let trades = store.list_agent_trades("a1").await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].amount_usd, 500.0);
    }
}
