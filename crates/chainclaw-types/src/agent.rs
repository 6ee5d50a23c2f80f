//! Autonomous agent and backtest types (spec.md §3, §4.9, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    DryRun,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Paused,
    Stopped,
}

/// Declarative strategy risk parameters (position caps etc., spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    pub max_position_usd: f64,
    pub max_daily_trades: u32,
    pub max_daily_exposure_usd: f64,
    #[serde(default)]
    pub blocked_tokens: Vec<String>,
}

/// The declarative part of a strategy: what it watches and how often it
/// re-evaluates. `evaluate` itself is supplied by the concrete strategy
/// implementation registered for `name`/`version` (see `chainclaw-strategy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDef {
    pub watchlist: Vec<String>,
    pub evaluation_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub skills: Vec<String>,
    #[serde(default)]
    pub knowledge_sources: Vec<String>,
    pub risk_params: RiskParams,
    pub strategy: StrategyDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    pub id: String,
    pub agent_name: String,
    pub version: String,
    pub user_id: String,
    pub mode: AgentMode,
    pub config_options: Value,
    pub status: AgentStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// A single decision produced by `strategy.evaluate` (spec.md §4.9 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub token: String,
    pub amount_usd: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub id: i64,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub context: Value,
    pub decisions: Value,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeLabel {
    pub trade_id: String,
    pub agent_id: String,
    pub token: String,
    pub action: String,
    pub price_at_execution: f64,
    pub window: OutcomeWindow,
    pub price_at_window: f64,
    pub pnl_usd: f64,
    pub pnl_percent: f64,
    pub labeled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Filled,
    Failed,
}

/// One trade produced by a running (or backtested) agent — the Transaction
/// Record superset named in spec.md §3 "Agent instance"; links back to a
/// `tx_log` row when the trade is live, not dry-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrade {
    pub id: String,
    pub agent_id: String,
    pub user_id: String,
    pub mode: AgentMode,
    pub token: String,
    pub action: String,
    pub amount_usd: f64,
    pub execution_price: f64,
    pub status: TradeStatus,
    pub tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Unsubscribed,
}

/// Marketplace subscription lifecycle record (SPEC_FULL.md §B "Marketplace"
/// — generalises §4.9's start/pause/resume/stop to subscribe/unsubscribe).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceSubscription {
    pub id: String,
    pub user_id: String,
    pub agent_name: String,
    pub agent_version: String,
    pub mode: AgentMode,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Metrics common to the Backtest Engine and the Performance Tracker
/// (spec.md §4.10 step 4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub win_rate_pct: f64,
    pub total_trades: u32,
    pub profitable_trades: u32,
    pub avg_trade_return_pct: f64,
    pub benchmark_return_pct: Option<f64>,
    pub alpha_pct: Option<f64>,
}
