//! DB size monitor (spec.md §5; SPEC_FULL.md §B) — a scheduled maintenance
//! job (itself a cron job ticking every hour) that deletes rows past their
//! retention horizon, then attempts a `VACUUM`.
//!
//! Per DESIGN.md's Open Question decision, a failed vacuum (the connection
//! is busy elsewhere) is a warn-and-continue, not a hard error — retention
//! deletion already happened and is the part that matters for disk growth.

use chrono::{Duration, Utc};
use rusqlite::params;
use tracing::warn;

use crate::error::StoreResult;
use crate::store::Store;

/// One row per table name plus its retention horizon (spec.md §5).
const RETENTION: &[(&str, &str, i64)] = &[
    ("conversations", "created_at", 30),
    ("tx_log", "created_at", 90),
    ("risk_cache", "cached_at", 7),
    ("reasoning_traces", "timestamp", 30),
    ("historical_prices", "fetched_at", 180),
];

/// Dead (delivered) delivery-queue rows past 7 days (spec.md §5).
const DELIVERY_QUEUE_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    pub deleted_by_table: Vec<(String, usize)>,
    pub vacuumed: bool,
}

impl Store {
    /// Applies every retention rule, then attempts a `VACUUM`. Intended to
    /// be invoked from an hourly cron job (SPEC_FULL.md §B).
    pub async fn apply_retention(&self) -> StoreResult<RetentionReport> {
        let conn = self.conn().await;
        let now = Utc::now();
        let mut report = RetentionReport::default();

        for (table, column, days) in RETENTION {
            let cutoff = (now - Duration::days(*days)).to_rfc3339();
            let deleted = conn.execute(
                &format!("DELETE FROM {table} WHERE {column} < ?1"),
                params![cutoff],
            )?;
            report.deleted_by_table.push((table.to_string(), deleted));
        }

        let delivery_cutoff = (now - Duration::days(DELIVERY_QUEUE_RETENTION_DAYS)).to_rfc3339();
        let deleted = conn.execute(
            "DELETE FROM delivery_queue WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
            params![delivery_cutoff],
        )?;
        report.deleted_by_table.push(("delivery_queue".to_string(), deleted));

        match conn.execute_batch("VACUUM") {
            Ok(()) => report.vacuumed = true,
            Err(e) => warn!(error = %e, "vacuum skipped, database busy"),
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainclaw_types::user::ConversationRole;

    #[tokio::test]
    async fn retention_deletes_only_expired_rows() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_message("u1", ConversationRole::User, "recent").await.unwrap();
        {
            let conn = store.conn().await;
            let old = (Utc::now() - Duration::days(40)).to_rfc3339();
            conn.execute(
                "INSERT INTO conversations (user_id, role, content, created_at) VALUES (?1, 'user', 'stale', ?2)",
                params!["u1", old],
            )
            .unwrap();
        }
        let report = store.apply_retention().await.unwrap();
        assert_eq!(store.history_len("u1").await.unwrap(), 1);
        let (_, deleted) = report.deleted_by_table.iter().find(|(t, _)| t == "conversations").unwrap();
        assert_eq!(*deleted, 1);
    }

    #[tokio::test]
    async fn retention_reports_vacuum_outcome() {
        let store = Store::open_in_memory().await.unwrap();
        let report = store.apply_retention().await.unwrap();
        assert!(report.vacuumed);
    }
}
