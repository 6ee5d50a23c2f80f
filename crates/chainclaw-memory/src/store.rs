use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::StoreResult;

/// The single durability boundary (spec.md §5): one WAL-mode `rusqlite`
/// connection guarded by an async mutex, shared by every table-specific
/// module in this crate. Grounded on the teacher's `MemoryDatabase::new`
/// (open, `busy_timeout`, `PRAGMA journal_mode = WAL`).
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl Store {
    pub async fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| crate::error::StoreError::InvalidConfig(e.to_string()))?;
        let db_path = data_dir.join("chainclaw.sqlite");
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA synchronous = NORMAL", [])?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), data_dir: data_dir.to_path_buf() };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests — still goes through the same schema init
    /// path as a real deployment.
    #[cfg(test)]
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), data_dir: PathBuf::from(":memory:") };
        store.init_schema().await?;
        Ok(store)
    }

    pub(crate) async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Flushes the WAL into the main database file (spec.md §5 shutdown
    /// "flush the store"). A plain `PRAGMA wal_checkpoint` rather than
    /// `TRUNCATE`: shutdown should not block on contending readers.
    pub async fn checkpoint(&self) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
        Ok(())
    }

    async fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_user_created
    ON conversations (user_id, created_at);

CREATE TABLE IF NOT EXISTS user_preferences (
    user_id TEXT PRIMARY KEY,
    default_chain_id INTEGER NOT NULL,
    slippage_tolerance_pct REAL NOT NULL,
    confirmation_required_usd REAL NOT NULL,
    max_transactions_per_day INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    source TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memory_chunks_user ON memory_chunks (user_id);

CREATE TABLE IF NOT EXISTS tx_log (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    "from" TEXT NOT NULL,
    "to" TEXT NOT NULL,
    value TEXT NOT NULL,
    value_usd REAL NOT NULL DEFAULT 0,
    hash TEXT,
    status TEXT NOT NULL,
    skill_name TEXT NOT NULL,
    intent_description TEXT NOT NULL,
    simulation_result TEXT,
    guardrail_checks TEXT,
    gas_used TEXT,
    gas_price TEXT,
    block_number INTEGER,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tx_log_user ON tx_log (user_id);

CREATE TABLE IF NOT EXISTS dca_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    from_token TEXT NOT NULL,
    to_token TEXT NOT NULL,
    amount TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    frequency TEXT NOT NULL,
    wallet_address TEXT,
    status TEXT NOT NULL,
    last_run_at TEXT,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dca_jobs_user ON dca_jobs (user_id);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    token TEXT NOT NULL,
    threshold REAL NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    triggered_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_user ON alerts (user_id);

CREATE TABLE IF NOT EXISTS cron_jobs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    skill_name TEXT NOT NULL,
    skill_params TEXT NOT NULL,
    user_id TEXT NOT NULL,
    chain_id INTEGER,
    schedule TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    next_run_at_ms INTEGER,
    last_run_at_ms INTEGER,
    last_status TEXT,
    last_error TEXT,
    last_duration_ms INTEGER,
    consecutive_errors INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cron_jobs_user ON cron_jobs (user_id);

CREATE TABLE IF NOT EXISTS risk_cache (
    address TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    report TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (address, chain_id)
);

CREATE TABLE IF NOT EXISTS outcome_labels (
    trade_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    token TEXT NOT NULL,
    action TEXT NOT NULL,
    price_at_execution REAL NOT NULL,
    window TEXT NOT NULL,
    price_at_window REAL NOT NULL,
    pnl_usd REAL NOT NULL,
    pnl_percent REAL NOT NULL,
    labeled_at TEXT NOT NULL,
    PRIMARY KEY (trade_id, window)
);
CREATE INDEX IF NOT EXISTS idx_outcome_labels_agent ON outcome_labels (agent_id);

CREATE TABLE IF NOT EXISTS reasoning_traces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    context TEXT NOT NULL,
    decisions TEXT NOT NULL,
    reasoning TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reasoning_traces_agent ON reasoning_traces (agent_id);

CREATE TABLE IF NOT EXISTS enriched_reasoning (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reasoning_trace_id INTEGER NOT NULL,
    trade_id TEXT,
    row_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_trades (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    mode TEXT NOT NULL,
    token TEXT NOT NULL,
    action TEXT NOT NULL,
    amount_usd REAL NOT NULL,
    execution_price REAL NOT NULL,
    status TEXT NOT NULL,
    tx_id TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agent_trades_agent ON agent_trades (agent_id);
CREATE INDEX IF NOT EXISTS idx_agent_trades_user ON agent_trades (user_id);

CREATE TABLE IF NOT EXISTS marketplace_subscriptions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    agent_version TEXT NOT NULL,
    mode TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    unsubscribed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_marketplace_subscriptions_user ON marketplace_subscriptions (user_id);

CREATE TABLE IF NOT EXISTS historical_prices (
    token TEXT NOT NULL,
    day TEXT NOT NULL,
    price_usd REAL NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (token, day)
);

CREATE TABLE IF NOT EXISTS risk_lists (
    user_id TEXT NOT NULL,
    chain_id INTEGER NOT NULL,
    address TEXT NOT NULL,
    list_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, chain_id, address, list_type)
);
CREATE INDEX IF NOT EXISTS idx_risk_lists_user ON risk_lists (user_id, chain_id);

CREATE TABLE IF NOT EXISTS delivery_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    channel_id TEXT,
    platform TEXT,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    delivered_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_delivery_queue_user ON delivery_queue (user_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_and_runs_schema_twice_without_error() {
        let store = Store::open_in_memory().await.unwrap();
        store.init_schema().await.unwrap();
    }
}
