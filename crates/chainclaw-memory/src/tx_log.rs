//! Transaction Log (spec.md §2 "Transaction Log", §3 "Transaction record").
//!
//! Append-only creation, monotonic status advancement enforced at the
//! store boundary so no caller can accidentally skip or rewind a stage.

use chainclaw_types::tx::{TxRecord, TxStatus};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub async fn create_tx(
        &self,
        user_id: &str,
        chain_id: u64,
        from: &str,
        to: &str,
        value: &str,
        value_usd: f64,
        skill_name: &str,
        intent_description: &str,
    ) -> StoreResult<TxRecord> {
        let now = Utc::now();
        let record = TxRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            chain_id,
            from: from.to_string(),
            to: to.to_string(),
            value: value.to_string(),
            value_usd,
            hash: None,
            status: TxStatus::Pending,
            skill_name: skill_name.to_string(),
            intent_description: intent_description.to_string(),
            simulation_result: None,
            guardrail_checks: None,
            gas_used: None,
            gas_price: None,
            block_number: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO tx_log (id, user_id, chain_id, \"from\", \"to\", value, value_usd, hash, status,
                skill_name, intent_description, simulation_result, guardrail_checks,
                gas_used, gas_price, block_number, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, NULL, NULL, NULL, NULL, NULL, NULL, ?11, ?11)",
            params![
                record.id, record.user_id, record.chain_id as i64, record.from, record.to,
                record.value, record.value_usd, status_str(record.status), record.skill_name,
                record.intent_description, now.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    /// Enforces the status-machine invariant (spec.md §3, §8): rejects any
    /// transition that is not a legal monotonic advance.
    #[allow(clippy::too_many_arguments)]
    pub async fn advance_tx(
        &self,
        id: &str,
        next: TxStatus,
        hash: Option<&str>,
        simulation_result: Option<&Value>,
        guardrail_checks: Option<&Value>,
        gas_used: Option<&str>,
        gas_price: Option<&str>,
        block_number: Option<u64>,
        error: Option<&str>,
    ) -> StoreResult<TxRecord> {
        let current = self.get_tx(id).await?;
        if !current.status.can_advance_to(next) {
            return Err(StoreError::Validation(format!(
                "illegal tx status transition {:?} -> {:?}",
                current.status, next
            )));
        }
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "UPDATE tx_log SET status = ?1, hash = COALESCE(?2, hash),
                simulation_result = COALESCE(?3, simulation_result),
                guardrail_checks = COALESCE(?4, guardrail_checks),
                gas_used = COALESCE(?5, gas_used), gas_price = COALESCE(?6, gas_price),
                block_number = COALESCE(?7, block_number), error = COALESCE(?8, error),
                updated_at = ?9
             WHERE id = ?10",
            params![
                status_str(next),
                hash,
                simulation_result.map(|v| v.to_string()),
                guardrail_checks.map(|v| v.to_string()),
                gas_used,
                gas_price,
                block_number.map(|b| b as i64),
                error,
                now.to_rfc3339(),
                id,
            ],
        )?;
        drop(conn);
        self.get_tx(id).await
    }

    pub async fn get_tx(&self, id: &str) -> StoreResult<TxRecord> {
        let conn = self.conn().await;
        conn.query_row(
            "SELECT id, user_id, chain_id, \"from\", \"to\", value, value_usd, hash, status, skill_name,
                intent_description, simulation_result, guardrail_checks, gas_used, gas_price,
                block_number, error, created_at, updated_at FROM tx_log WHERE id = ?1",
            params![id],
            row_to_tx,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Database(other),
        })
    }

    pub async fn list_user_txs(&self, user_id: &str) -> StoreResult<Vec<TxRecord>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chain_id, \"from\", \"to\", value, value_usd, hash, status, skill_name,
                intent_description, simulation_result, guardrail_checks, gas_used, gas_price,
                block_number, error, created_at, updated_at FROM tx_log
             WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_tx)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Non-terminal transactions across all users, used by the boot-time
    /// reconciliation pass (spec.md §9 Open Question #1).
    pub async fn list_non_terminal_txs(&self) -> StoreResult<Vec<TxRecord>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, chain_id, \"from\", \"to\", value, value_usd, hash, status, skill_name,
                intent_description, simulation_result, guardrail_checks, gas_used, gas_price,
                block_number, error, created_at, updated_at FROM tx_log
             WHERE status NOT IN ('confirmed', 'failed')",
        )?;
        let rows = stmt.query_map([], row_to_tx)?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Sum of `value_usd` for a user's transactions created since `since`,
    /// used by the guardrail's per-day dollar limit (spec.md §4.7 stage 3).
    /// Only non-failed transactions count toward the day's spend.
    /// `exclude_tx_id` lets a caller evaluating the guardrail for a
    /// transaction that is already persisted (as the pipeline's is, since
    /// the row is created before guardrails run) leave that row's own
    /// value out of the running total.
    pub async fn sum_user_tx_value_usd_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude_tx_id: Option<&str>,
    ) -> StoreResult<f64> {
        let conn = self.conn().await;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(value_usd), 0) FROM tx_log
             WHERE user_id = ?1 AND created_at >= ?2 AND status != 'failed' AND id != ?3",
            params![user_id, since.to_rfc3339(), exclude_tx_id.unwrap_or("")],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

fn status_str(status: TxStatus) -> &'static str {
    match status {
        TxStatus::Pending => "pending",
        TxStatus::Simulated => "simulated",
        TxStatus::Broadcast => "broadcast",
        TxStatus::Confirmed => "confirmed",
        TxStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> TxStatus {
    match s {
        "simulated" => TxStatus::Simulated,
        "broadcast" => TxStatus::Broadcast,
        "confirmed" => TxStatus::Confirmed,
        "failed" => TxStatus::Failed,
        _ => TxStatus::Pending,
    }
}

fn row_to_tx(row: &rusqlite::Row<'_>) -> rusqlite::Result<TxRecord> {
    let created_at: String = row.get(17)?;
    let updated_at: String = row.get(18)?;
    let parse_dt = |s: &str| -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
    };
    Ok(TxRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        chain_id: row.get::<_, i64>(2)? as u64,
        from: row.get(3)?,
        to: row.get(4)?,
        value: row.get(5)?,
        value_usd: row.get(6)?,
        hash: row.get(7)?,
        status: parse_status(&row.get::<_, String>(8)?),
        skill_name: row.get(9)?,
        intent_description: row.get(10)?,
        simulation_result: row.get::<_, Option<String>>(11)?.and_then(|s| serde_json::from_str(&s).ok()),
        guardrail_checks: row.get::<_, Option<String>>(12)?.and_then(|s| serde_json::from_str(&s).ok()),
        gas_used: row.get(13)?,
        gas_price: row.get(14)?,
        block_number: row.get::<_, Option<i64>>(15)?.map(|b| b as u64),
        error: row.get(16)?,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_tx_starts_pending() {
        let store = Store::open_in_memory().await.unwrap();
        let tx = store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 100.0, "swap", "swap 1 ETH").await.unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn legal_transitions_advance_monotonically() {
        let store = Store::open_in_memory().await.unwrap();
        let tx = store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 100.0, "swap", "swap").await.unwrap();
        let tx = store
            .advance_tx(&tx.id, TxStatus::Simulated, None, None, None, None, None, None, None)
            .await
            .unwrap();
        assert_eq!(tx.status, TxStatus::Simulated);
        let tx = store
            .advance_tx(&tx.id, TxStatus::Broadcast, Some("0xhash"), None, None, None, None, None, None)
            .await
            .unwrap();
        assert_eq!(tx.hash.as_deref(), Some("0xhash"));
        let tx = store
            .advance_tx(&tx.id, TxStatus::Confirmed, None, None, None, Some("21000"), None, Some(100), None)
            .await
            .unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        let tx = store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 100.0, "swap", "swap").await.unwrap();
        let result = store
            .advance_tx(&tx.id, TxStatus::Confirmed, None, None, None, None, None, None, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn terminal_transaction_cannot_advance_further() {
        let store = Store::open_in_memory().await.unwrap();
        let tx = store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 100.0, "swap", "swap").await.unwrap();
        store
            .advance_tx(&tx.id, TxStatus::Failed, None, None, None, None, None, None, Some("risk blocked"))
            .await
            .unwrap();
        let result = store
            .advance_tx(&tx.id, TxStatus::Simulated, None, None, None, None, None, None, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn day_sum_excludes_failed_and_other_users() {
        let store = Store::open_in_memory().await.unwrap();
        let since = Utc::now() - chrono::Duration::hours(1);
        store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 100.0, "swap", "swap").await.unwrap();
        let failing = store.create_tx("u1", 1, "0xfrom", "0xto", "1.0", 50.0, "swap", "swap").await.unwrap();
        store
            .advance_tx(&failing.id, TxStatus::Failed, None, None, None, None, None, None, Some("boom"))
            .await
            .unwrap();
        store.create_tx("u2", 1, "0xfrom", "0xto", "1.0", 999.0, "swap", "swap").await.unwrap();
        let total = store.sum_user_tx_value_usd_since("u1", since, None).await.unwrap();
        assert_eq!(total, 100.0);
    }
}
